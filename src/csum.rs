//! 位图块的 32 位滚动校验和（Adler-32）
//!
//! 最后一个不完整的位图段，其尾部按全 1 字节参与计算。Adler-32 可以从上一次的
//! 结果继续累加，这里逐段喂入填充字节，无需构造填充副本。

use adler::Adler32;

/// 一次喂入填充字节的块大小
const PAD_CHUNK: usize = 64;

/// 计算校验和（一次性计算）
#[inline]
pub fn adler32(data: &[u8]) -> u32 {
    adler::adler32_slice(data)
}

/// 计算校验和（追加模式）
///
/// # 参数
/// * `sum` - 上一次的结果（首次使用 1）
/// * `data` - 要追加的数据
#[inline]
pub fn adler32_append(sum: u32, data: &[u8]) -> u32 {
    let mut hasher = Adler32::from_checksum(sum);
    hasher.write_slice(data);
    hasher.checksum()
}

/// 计算 `payload` 后接 `pad` 个 0xFF 字节的校验和
///
/// 用于位图最后一段：实际位图字节之后、块容量之前的部分视为全 1。
pub fn adler32_padded(payload: &[u8], pad: usize) -> u32 {
    let ones = [0xFFu8; PAD_CHUNK];
    let mut sum = adler32(payload);

    let mut left = pad;
    while left > 0 {
        let n = left.min(PAD_CHUNK);
        sum = adler32_append(sum, &ones[..n]);
        left -= n;
    }

    sum
}
