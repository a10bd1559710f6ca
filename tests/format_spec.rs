//! Unit properties of the subfield format mini-language parser.

use sdts_reader::iso8211::format;
use sdts_reader::{FormatSpec, SdtsError};

fn letters(specs: &[FormatSpec]) -> String {
    specs.iter().map(|s| s.letter).collect()
}

#[test]
fn plain_letters_and_repeat_counts() {
    let specs = format::parse("(A,I,B,3I)").unwrap();
    assert_eq!(letters(&specs), "AIBIII");
    assert!(specs.iter().all(|s| s.size == 0));
}

#[test]
fn explicit_byte_sizes() {
    let specs = format::parse("(A(3),I(4))").unwrap();
    assert_eq!(
        specs,
        vec![
            FormatSpec { letter: 'A', size: 3 },
            FormatSpec { letter: 'I', size: 4 },
        ]
    );
}

#[test]
fn binary_sizes_are_bit_counts() {
    let specs = format::parse("(B(16))").unwrap();
    assert_eq!(specs, vec![FormatSpec { letter: 'B', size: 2 }]);

    let specs = format::parse("(2B(32))").unwrap();
    assert_eq!(
        specs,
        vec![
            FormatSpec { letter: 'B', size: 4 },
            FormatSpec { letter: 'B', size: 4 },
        ]
    );
}

#[test]
fn unaligned_binary_size_is_fatal() {
    let err = format::parse("(B(12))").unwrap_err();
    assert!(matches!(err, SdtsError::BitWidthNotByteAligned(12)));
}

#[test]
fn redundant_nested_pair_is_stripped() {
    let specs = format::parse("((A,I))").unwrap();
    assert_eq!(letters(&specs), "AI");
}

#[test]
fn repeated_group_expands() {
    let specs = format::parse("(2(A,I),R)").unwrap();
    assert_eq!(letters(&specs), "AIAIR");
}

#[test]
fn group_nesting_is_depth_limited() {
    let err = format::parse("(2(A,3(I)))").unwrap_err();
    assert!(matches!(err, SdtsError::FormatSyntax(_)));
}

#[test]
fn non_numeric_size_is_tolerated() {
    // Delimited-string idiom: the size is discovered via terminator.
    let specs = format::parse("(A(,),I(4))").unwrap();
    assert_eq!(
        specs,
        vec![
            FormatSpec { letter: 'A', size: 0 },
            FormatSpec { letter: 'I', size: 4 },
        ]
    );
}

#[test]
fn missing_parentheses_are_rejected() {
    assert!(matches!(
        format::parse("A,I"),
        Err(SdtsError::FormatSyntax(_))
    ));
}

#[test]
fn zero_repeat_count_is_rejected() {
    assert!(matches!(
        format::parse("(0I)"),
        Err(SdtsError::FormatSyntax(_))
    ));
}

#[test]
fn lowercase_letters_are_normalized() {
    let specs = format::parse("(b(16),a(2))").unwrap();
    assert_eq!(
        specs,
        vec![
            FormatSpec { letter: 'B', size: 2 },
            FormatSpec { letter: 'A', size: 2 },
        ]
    );
}
