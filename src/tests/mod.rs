// Test modules for llm-router crate
//
// Test organization follows the template pattern where each source file
// has a corresponding test file that focuses on business logic verification.
// Provider translation tests live next to each provider under
// `providers/*/tests`; HTTP behavior is covered in the crate's `tests/`.

pub mod router;
