// Scene-graph/import sink seam: artifact import and composite assembly.

pub mod assembler;
pub mod memory;
pub mod traits;
