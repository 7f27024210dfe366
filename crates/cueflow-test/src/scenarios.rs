//! End-to-end scenario tests
//!
//! Resolution through state extraction, exercised the way a playout
//! system drives the engine: resolve once, query repeatedly, mutate a
//! little, resolve again with the cache.
