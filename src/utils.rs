//! Identifier generation and hashing helpers

use bech32::Bech32m;
use uuid7::uuid7;

use crate::types::TimeStamp;

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Human readable order number: `ORD-YYYYMMDD-<12 hex>`.
///
/// The hex tail is taken from the random portion of a fresh uuid7, so two
/// checkouts in the same millisecond still get distinct numbers. The store
/// keeps a uniqueness index and retries on the (negligible) chance of a clash.
pub fn new_order_number(at: &TimeStamp) -> String {
    let id = uuid7();
    let bytes = id.as_bytes();
    format!(
        "ORD-{}-{}",
        at.to_datetime_utc().format("%Y%m%d"),
        hex::encode_upper(&bytes[10..16])
    )
}

/// Hex sha256 of an already encoded payload.
pub fn digest(bytes: &[u8]) -> String {
    sha256::digest(bytes)
}
