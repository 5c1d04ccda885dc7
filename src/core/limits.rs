/*!
 * Engine Limits and Constants
 *
 * Centralized location for bounds on caller-supplied input and in-memory logs.
 *
 * - Security-critical constants are marked with [SECURITY]
 * - Performance-critical constants are marked with [PERF]
 */

// =============================================================================
// PATH LIMITS
// =============================================================================

/// Maximum number of segments in a permission path
/// [SECURITY] Tree recursion depth is bounded by path length
pub const DEFAULT_MAX_PATH_DEPTH: usize = 32;

/// Maximum byte length of one path segment
/// [SECURITY] Bounds allocation per materialized node
pub const DEFAULT_MAX_SEGMENT_LEN: usize = 256;

// =============================================================================
// DOCUMENT LIMITS
// =============================================================================

/// Maximum untrusted fragment size (1MB)
/// [SECURITY] The safety scan is linear, but the wrapped copy is not free
pub const DEFAULT_MAX_FRAGMENT_BYTES: usize = 1024 * 1024;

// =============================================================================
// AUDIT LIMITS
// =============================================================================

/// Global audit ring buffer capacity
pub const DEFAULT_AUDIT_CAPACITY: usize = 10_000;

/// Per-tree audit ring buffer capacity
pub const MAX_AUDIT_EVENTS_PER_KEY: usize = 1_000;

// =============================================================================
// ARENA SIZING
// =============================================================================

/// Initial node capacity of a fresh tree arena
/// [PERF] Root plus a short grant path without reallocation
pub const INITIAL_TREE_CAPACITY: usize = 8;
