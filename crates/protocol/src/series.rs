//! AA-style series numbering.
//!
//! Each run of a project gets a series label derived from the number of
//! runs the project already has: `AA`, `AB`, ... `AZ`, `BA`, ... `ZZ`, and a
//! third letter is prepended once the count reaches 676.

const CAPITAL_A: u32 = 'A' as u32;

/// Convert a run count to its series label.
///
/// The arithmetic is kept literal: `a = count / 676`,
/// `b = (count - a * 676) / 26`, `c = count % 26`, and the leading letter is
/// only emitted when `a` is non-zero. As a consequence `676` maps to `AAA`
/// (not `BAA`) and `702` to `ABA`.
pub fn series_from_count(count: u32) -> String {
    let a = count / 676;
    let b = (count - a * 676) / 26;
    let c = count % 26;

    let mut series = String::with_capacity(3);
    if a > 0 {
        series.push(letter(a + CAPITAL_A - 1));
    }
    series.push(letter(b + CAPITAL_A));
    series.push(letter(c + CAPITAL_A));
    series
}

fn letter(code: u32) -> char {
    char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
}
