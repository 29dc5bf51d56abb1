// Agent pipeline: chat types, runtime, record parsing and the tabular hand-off

pub mod chat;
pub mod parser;
pub mod runtime;
pub mod stage;
pub mod tabular;

// Re-export the pieces the phase drivers use
pub use parser::{parse_record, parse_records, records_from_chain};
pub use runtime::AgentRuntime;
pub use tabular::{GateRead, TableRow};
