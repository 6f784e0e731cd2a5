//! Binary encoding of one batch as sent by [`crate::HttpSink`].
//!
//! All integers are big-endian. Strings are a `u16` byte length followed by
//! UTF-8 bytes. A batch is the namespace, a `u16` point count, then for each
//! point its name, `u64` milliseconds since the Unix epoch, `f64` value, a
//! `u16` dimension count and that many key/value string pairs.

use std::{
    io::{self, Write},
    time::{Duration, UNIX_EPOCH},
};

use crate::{Dimensions, MetricPoint};

pub const CONTENT_TYPE: &str = "application/x-metric-batch";
/// Longest string, in bytes, a `u16` length prefix can carry.
pub const MAX_STR_LEN: usize = u16::MAX as usize;
pub const MAX_DIMENSIONS: usize = u16::MAX as usize;

pub fn encode_batch(
    wtr: &mut impl Write,
    namespace: &str,
    points: &[MetricPoint],
) -> io::Result<()> {
    encode_str(wtr, namespace)?;
    wtr.write_all(&encode_len(points.len())?)?;
    for point in points {
        encode_point(wtr, point)?;
    }
    Ok(())
}

fn encode_point(wtr: &mut impl Write, point: &MetricPoint) -> io::Result<()> {
    encode_str(wtr, &point.name)?;
    let millis = point
        .timestamp
        .duration_since(UNIX_EPOCH)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
        .as_millis();
    let millis =
        u64::try_from(millis).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    wtr.write_all(&millis.to_be_bytes())?;
    wtr.write_all(&point.value.to_be_bytes())?;
    wtr.write_all(&encode_len(point.dimensions.len())?)?;
    for (key, value) in &point.dimensions {
        encode_str(wtr, key)?;
        encode_str(wtr, value)?;
    }
    Ok(())
}

fn encode_str(wtr: &mut impl Write, s: &str) -> io::Result<()> {
    wtr.write_all(&encode_len(s.len())?)?;
    wtr.write_all(s.as_bytes())
}

fn encode_len(len: usize) -> io::Result<[u8; 2]> {
    let len = u16::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("length {len} exceeds {}", u16::MAX),
        )
    })?;
    Ok(len.to_be_bytes())
}

/// Reads one batch, returning its namespace and points.
pub async fn decode_batch<R>(rdr: &mut R) -> io::Result<(String, Vec<MetricPoint>)>
where
    R: tokio::io::AsyncRead + Unpin,
{
    use tokio::io::AsyncReadExt;
    let namespace = decode_str(rdr).await?;
    let count = rdr.read_u16().await?;
    let mut points = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let name = decode_str(rdr).await?;
        let millis = rdr.read_u64().await?;
        let value = rdr.read_f64().await?;
        let dimension_count = rdr.read_u16().await?;
        let mut dimensions = Dimensions::new();
        for _ in 0..dimension_count {
            let key = decode_str(rdr).await?;
            let value = decode_str(rdr).await?;
            dimensions.insert(key, value);
        }
        points.push(MetricPoint {
            name,
            value,
            timestamp: UNIX_EPOCH + Duration::from_millis(millis),
            dimensions,
        });
    }
    Ok((namespace, points))
}

async fn decode_str<R>(rdr: &mut R) -> io::Result<String>
where
    R: tokio::io::AsyncRead + Unpin,
{
    use tokio::io::AsyncReadExt;
    let len = rdr.read_u16().await?;
    let mut buf = vec![0; usize::from(len)];
    rdr.read_exact(&mut buf).await?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
