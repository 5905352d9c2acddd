pub mod label;
pub mod logging;
pub mod text;

pub use label::{extract_indices, index_to_label, label_to_index};
pub use logging::truncate_text;
pub use text::{html_to_text, normalize_answer};
