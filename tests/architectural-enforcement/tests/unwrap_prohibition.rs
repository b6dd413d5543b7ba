//! Integration Test: Panic Prohibition
//!
//! **Policy**: Production code propagates errors. `unwrap()` and `expect()`
//! are only allowed in tests and in the `test_utils` module.

use architectural_enforcement::scan;

#[test]
fn test_no_unwrap_or_expect_in_production_code() {
    let violations = scan(|code| code.contains(".unwrap()") || code.contains(".expect("));

    if !violations.is_empty() {
        eprintln!("\n❌ unwrap()/expect() found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ Use instead:");
        eprintln!("  - `?` with a thiserror variant");
        eprintln!("  - `unwrap_or` / `unwrap_or_else` with a real fallback");
        eprintln!("  - `let Some(..) = .. else {{ warn + return }}`");

        panic!(
            "\nFound {} panic site(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}
