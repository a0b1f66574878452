pub mod graph;
pub mod memory;
pub mod system_prompt;
pub mod tools;
