// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Aggregates worker monitoring samples into periodic log records.

use chrono::{DateTime, Utc};
use dx_core::{Clock, OfflineLogRecord, SystemClock, TransactionId};
use dx_wire::{WorkerEvent, TYPE_FIELD};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Worker event kinds carrying monitoring samples.
pub const MONITOR_EVENT_KINDS: [&str; 2] = ["monitoring_data", "pose"];

/// Default aggregation window, one recording clip long.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5);

/// Sample fields that are never averaged.
const IGNORED_FIELDS: [&str; 2] = [TYPE_FIELD, "timestamp"];

const PHONE_FIELDS: [&str; 3] = ["phone_present", "isPhonePresent", "is_phone_present"];

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub room_code: String,
    pub window: Duration,
    /// Content type recorded for the window's clip.
    pub mimetype: String,
}

impl MonitorConfig {
    pub fn new(room_code: impl Into<String>) -> Self {
        Self { room_code: room_code.into(), window: DEFAULT_WINDOW, mimetype: "video/webm".to_string() }
    }

    dx_core::setters! {
        window: Duration,
        into mimetype: String,
    }
}

/// Running mean of one numeric field.
#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: u64,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(&self) -> f64 {
        self.sum / self.count as f64
    }
}

/// One open aggregation window.
///
/// The window opens at the first sample and is due once `window` has
/// elapsed. Closing it yields a record with a fresh transaction id; an
/// empty window yields nothing.
pub struct MonitorWindow<C: Clock = SystemClock> {
    config: MonitorConfig,
    clock: C,
    opened_at: Option<DateTime<Utc>>,
    samples: u64,
    means: BTreeMap<String, Mean>,
    phone_present: bool,
}

impl MonitorWindow<SystemClock> {
    pub fn new(config: MonitorConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> MonitorWindow<C> {
    pub fn with_clock(config: MonitorConfig, clock: C) -> Self {
        Self {
            config,
            clock,
            opened_at: None,
            samples: 0,
            means: BTreeMap::new(),
            phone_present: false,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn is_monitor_event(event: &WorkerEvent) -> bool {
        MONITOR_EVENT_KINDS.contains(&event.kind())
    }

    /// Add a sample. Returns false for events that are not monitoring samples.
    pub fn observe(&mut self, event: &WorkerEvent) -> bool {
        if !Self::is_monitor_event(event) {
            return false;
        }
        if self.opened_at.is_none() {
            self.opened_at = Some(self.clock.utc_now());
        }
        self.samples += 1;
        self.phone_present |= carries_phone(event.body());
        for (key, value) in event.body() {
            if IGNORED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            if let Some(number) = value.as_f64() {
                self.means.entry(key.clone()).or_default().add(number);
            }
        }
        true
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Whether the open window has run its full length.
    pub fn is_due(&self) -> bool {
        match self.opened_at {
            Some(opened) => {
                let elapsed = self.clock.utc_now().signed_duration_since(opened);
                elapsed.to_std().map(|e| e >= self.config.window).unwrap_or(false)
            }
            None => false,
        }
    }

    /// Close the window, returning its record if it saw any samples.
    pub fn close(&mut self) -> Option<OfflineLogRecord> {
        let opened_at = self.opened_at.take()?;
        let samples = std::mem::take(&mut self.samples);
        let means = std::mem::take(&mut self.means);
        let phone_present = std::mem::take(&mut self.phone_present);

        let means: Map<String, Value> =
            means.into_iter().map(|(key, mean)| (key, Value::from(mean.value()))).collect();
        let mut scores = Map::new();
        scores.insert("samples".to_string(), Value::from(samples));
        scores.insert("means".to_string(), Value::Object(means));

        Some(OfflineLogRecord {
            transaction_id: TransactionId::from(uuid::Uuid::new_v4().to_string()),
            room_code: self.config.room_code.clone(),
            scores: Value::Object(scores),
            is_phone_present: phone_present,
            mimetype: self.config.mimetype.clone(),
            start_time: opened_at,
            video_path: None,
            created_at: self.clock.utc_now(),
        })
    }
}

fn carries_phone(body: &Map<String, Value>) -> bool {
    PHONE_FIELDS.iter().any(|field| body.get(*field).and_then(Value::as_bool).unwrap_or(false))
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
