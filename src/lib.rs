#![cfg_attr(not(test), no_std)]
//! Helpers for unpacking legacy UEFI firmware capsules and images.
//!
//! ## License
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

#[cfg(feature = "efi_lz77")]
pub use efi_lz77;
