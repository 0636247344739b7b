//! Match history persistence

pub mod history;
pub mod supabase;

pub use history::{run_history_writer, MatchRecord, MatchRecorder};
pub use supabase::SupabaseClient;
