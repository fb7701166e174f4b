// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    webm          = { "video/webm", "webm" },
    webm_codecs   = { "video/webm;codecs=vp9,opus", "webm" },
    unknown       = { "video/x-unknown", "webm" },
    wildcard      = { "video/*", "webm" },
    empty         = { "", "webm" },
)]
fn extension_for_mimetype(mimetype: &str, expected: &str) {
    assert_eq!(extension_for(mimetype), expected);
}

#[yare::parameterized(
    mp4           = { "video/mp4" },
    uppercase     = { "VIDEO/MP4" },
    matroska      = { "video/x-matroska" },
    quicktime     = { "video/quicktime" },
    mpeg          = { "video/mpeg" },
    three_gpp     = { "video/3gpp" },
    flv           = { "video/x-flv" },
    png           = { "image/png" },
)]
fn extension_maps_back_to_the_same_type(mimetype: &str) {
    let ext = extension_for(mimetype);
    assert_ne!(ext, DEFAULT_EXTENSION, "{mimetype} fell back to the default");
    let path = format!("video_1.{ext}");
    assert_eq!(mimetype_for(Path::new(&path)), mimetype.to_ascii_lowercase());
}

#[yare::parameterized(
    webm          = { "/tmp/videos/video_1.webm", "video/webm" },
    mp4_upper     = { "clip.MP4", "video/mp4" },
    mpeg          = { "clip.mpeg", "video/mpeg" },
    no_extension  = { "/tmp/videos/video_1", "application/octet-stream" },
    unknown       = { "clip.xyz-unknown", "application/octet-stream" },
)]
fn mimetype_for_path(path: &str, expected: &str) {
    assert_eq!(mimetype_for(Path::new(path)), expected);
}
