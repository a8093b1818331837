//! Numeric primitives for SCPN Magnet Core.

pub mod linalg;
pub mod prox;
