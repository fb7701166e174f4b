// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative macros shared by the workspace.

/// Generate consuming setter methods inside an `impl` block.
///
/// Each entry is `field: Type`, optionally marked:
/// - plain: setter takes `Type`
/// - `into`: setter takes `impl Into<Type>`
/// - `some`: field is `Option<Type>`, setter takes `impl Into<Type>`
///
/// ```ignore
/// impl LinkConfig {
///     dx_core::setters! {
///         ack_timeout: Duration,
///         into url: String,
///         some api_key: String,
///     }
/// }
/// ```
#[macro_export]
macro_rules! setters {
    () => {};
    (into $field:ident : $ty:ty $(, $($rest:tt)*)?) => {
        pub fn $field(mut self, value: impl Into<$ty>) -> Self {
            self.$field = value.into();
            self
        }
        $crate::setters! { $($($rest)*)? }
    };
    (some $field:ident : $ty:ty $(, $($rest:tt)*)?) => {
        pub fn $field(mut self, value: impl Into<$ty>) -> Self {
            self.$field = Some(value.into());
            self
        }
        $crate::setters! { $($($rest)*)? }
    };
    ($field:ident : $ty:ty $(, $($rest:tt)*)?) => {
        pub fn $field(mut self, value: $ty) -> Self {
            self.$field = value;
            self
        }
        $crate::setters! { $($($rest)*)? }
    };
}
