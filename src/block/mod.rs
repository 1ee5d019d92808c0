//! 块设备抽象
//!
//! 提供块设备接口和块级 I/O 操作。
//! block/device.rs 定义设备 trait 和按块寻址的包装器
//! block/io.rs 提供块读写，所有读写都是同步直写，不做缓存

mod device;
mod io;

#[cfg(test)]
mod mock;

pub use device::{BlockDev, BlockDevice, IoStats};

#[cfg(test)]
pub(crate) use mock::MockDevice;
