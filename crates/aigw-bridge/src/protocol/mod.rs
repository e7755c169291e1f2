//! Wire formats on both sides of the bridge

pub mod openai;
pub mod workers_ai;
