//! Conversions between `ethers` wire types and the `alloy-primitives` domain types.

use alloy_primitives::{Address, B256, I256, U256};
use ethers::types as eth;

pub fn to_eth_address(address: Address) -> eth::Address {
    eth::Address::from(address.0 .0)
}

pub fn from_eth_address(address: eth::Address) -> Address {
    Address::from(address.0)
}

pub fn from_eth_h256(hash: eth::H256) -> B256 {
    B256::from(hash.0)
}

pub fn to_eth_i256(value: I256) -> eth::I256 {
    eth::I256::from_raw(eth::U256::from_big_endian(
        &value.into_raw().to_be_bytes::<32>(),
    ))
}

pub fn from_eth_u256(value: eth::U256) -> U256 {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    U256::from_be_bytes(buf)
}
