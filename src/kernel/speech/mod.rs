pub mod answers;

pub use answers::{find_and_map, AnswerCorpus, AnswerError};
