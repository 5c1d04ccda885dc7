/*!
 * Document Module
 * Embedding untrusted JSON object fragments at a nested key path
 */

pub mod builder;

pub use builder::{at_path, is_safe_fragment, is_safe_key, DocumentBuilder};
