//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code waits on channels and I/O, never on time.
//! Replies, discoveries and fetch completions all arrive as messages.

use architectural_enforcement::scan;

#[test]
fn test_no_sleep_in_production_code() {
    let violations = scan(|code| code.contains("::sleep(") || code.contains(".sleep("));

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Sleep calls found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n❌ FORBIDDEN:");
        eprintln!("  - Sleep in polling loops");
        eprintln!("  - Sleep as poor man's synchronization");
        eprintln!("  - Sleep to 'wait' for the worker (await the reply!)");

        panic!(
            "\nFound {} sleep violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}
