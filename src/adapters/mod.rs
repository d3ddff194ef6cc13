//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements                  | Connects to               |
//! |----------------|-----------------------------|---------------------------|
//! | `device_id`    | -                           | eFuse factory MAC         |
//! | `image_region` | ImageRegionPort             | OTA app partition / RAM   |
//! | `log_sink`     | display + camera consumers  | Serial log output         |
//! | `nvs`          | ConfigPort                  | NVS / in-memory store     |
//! |                | FirmwareInfoPort            |                           |
//! | `system`       | SystemPort                  | Chip reset                |
//! | `time`         | RtcPort                     | System wall clock         |
//!
//! The queue-backed sinks (`FeedbackSink`, `DisplaySink`, `CameraPort`) are
//! implemented directly on the embassy-sync types in [`crate::rpc::channels`];
//! the GPIO motor bank and step timer live in [`crate::drivers`].

pub mod device_id;
pub mod image_region;
pub mod log_sink;
pub mod nvs;
pub mod system;
pub mod time;
