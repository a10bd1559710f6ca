//! End-to-end decoding tests over synthesized ISO 8211 byte streams.
//!
//! Records are built by the helpers at the top of this file: a 24-byte
//! leader, a directory with 4/3/3 entry widths (tag/length/position; the
//! long-record test widens them), and a field area whose fields each end in
//! a field terminator.

use std::fs::File;
use std::io::{Cursor, Write};

use byteorder::{BigEndian, ByteOrder};
use flate2::write::GzEncoder;
use flate2::Compression;
use sdts_reader::{ByteSource, FieldStructure, SdtsError, SdtsReader};

const FT: u8 = 0x1E;
const UT: u8 = 0x1F;

/// Build one physical record from complete field byte runs (terminators
/// included). Tags must match `tag_w`; a blank length field marks the
/// long-record escape.
fn build_record(
    kind: u8,
    level: u8,
    fc: &[u8; 2],
    (tag_w, len_w, pos_w): (usize, usize, usize),
    blank_len: bool,
    fields: &[(&str, &[u8])],
) -> Vec<u8> {
    let base = 24 + fields.len() * (tag_w + len_w + pos_w) + 1;
    let total: usize = base + fields.iter().map(|(_, data)| data.len()).sum::<usize>();

    let mut record = Vec::with_capacity(total);
    if blank_len {
        record.extend_from_slice(b"     ");
    } else {
        record.extend_from_slice(format!("{:05}", total).as_bytes());
    }
    record.push(level);
    record.push(kind);
    record.extend_from_slice(b"   ");
    record.extend_from_slice(fc);
    record.extend_from_slice(format!("{:05}", base).as_bytes());
    record.extend_from_slice(b" ! ");
    record.push(b'0' + len_w as u8);
    record.push(b'0' + pos_w as u8);
    record.push(b'0');
    record.push(b'0' + tag_w as u8);
    assert_eq!(record.len(), 24);

    let mut pos = 0usize;
    for (tag, data) in fields {
        assert_eq!(tag.len(), tag_w, "tag {:?} does not match tag width", tag);
        record.extend_from_slice(tag.as_bytes());
        record.extend_from_slice(format!("{:0w$}", data.len(), w = len_w).as_bytes());
        record.extend_from_slice(format!("{:0w$}", pos, w = pos_w).as_bytes());
        pos += data.len();
    }
    record.push(FT);
    for (_, data) in fields {
        record.extend_from_slice(data);
    }
    record
}

fn ddr(fields: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let borrowed: Vec<(&str, &[u8])> = fields
        .iter()
        .map(|(tag, data)| (*tag, data.as_slice()))
        .collect();
    build_record(b'L', b'2', b"06", (4, 3, 3), false, &borrowed)
}

fn dr(kind: u8, fields: &[(&str, &[u8])]) -> Vec<u8> {
    build_record(kind, b' ', b"  ", (4, 3, 3), false, fields)
}

/// One DDR field: 6-byte control area, name, optional labels and formats.
fn ddr_field(structure: char, dtype: char, name: &str, labels: &str, formats: &str) -> Vec<u8> {
    let mut field = Vec::new();
    field.push(structure as u8);
    field.push(dtype as u8);
    field.extend_from_slice(b"00;&");
    field.extend_from_slice(name.as_bytes());
    if labels.is_empty() && formats.is_empty() {
        field.push(FT);
    } else {
        field.push(UT);
        field.extend_from_slice(labels.as_bytes());
        field.push(UT);
        field.extend_from_slice(formats.as_bytes());
        field.push(FT);
    }
    field
}

fn file_control(title: &str) -> Vec<u8> {
    let mut field = Vec::new();
    field.extend_from_slice(b"0000;&");
    field.extend_from_slice(title.as_bytes());
    field.push(FT);
    field
}

/// The DDR most tests share: a record identifier, an elementary field, a
/// vector with explicit sizes, and a binary cartesian array.
fn sample_ddr() -> Vec<u8> {
    ddr(&[
        ("0000", file_control("TEST TRANSFER")),
        ("0001", ddr_field('0', '1', "DDF RECORD IDENTIFIER", "", "")),
        ("IDEN", ddr_field('0', '0', "IDENTIFICATION", "", "")),
        ("ELEV", ddr_field('1', '6', "ELEVATIONS", "X!Y!Z", "(3I(4))")),
        ("CELL", ddr_field('2', '5', "GRID CELL", "*X!Y", "(2B(16))")),
    ])
}

fn open(stream: Vec<u8>) -> SdtsReader {
    SdtsReader::from_source(ByteSource::from_reader(Cursor::new(stream))).unwrap()
}

fn terminated(data: &[u8]) -> Vec<u8> {
    let mut field = data.to_vec();
    field.push(FT);
    field
}

#[test]
fn open_compiles_descriptor_schema() {
    let mut reader = open(sample_ddr());

    assert_eq!(reader.file_title(), "TEST TRANSFER");
    let tags: Vec<&str> = reader.descriptors().iter().map(|d| d.tag.as_str()).collect();
    assert_eq!(tags, vec!["0001", "IDEN", "ELEV", "CELL"]);

    let elev = &reader.descriptors()[2];
    assert_eq!(elev.structure, FieldStructure::Vector);
    assert_eq!(elev.name, "ELEVATIONS");
    let labels: Vec<&str> = elev.labels.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(labels, vec!["X", "Y", "Z"]);
    assert_eq!(elev.formats.len(), 3);
    assert!(elev.formats.iter().all(|f| f.letter == 'I' && f.size == 4));

    let cell = &reader.descriptors()[3];
    assert_eq!(cell.structure, FieldStructure::Array);
    assert!(cell.labels.iter().all(|l| l.cartesian));

    // Descriptor-only stream: no data records, immediate end of file.
    assert!(reader.next_subfield().unwrap().is_none());
}

#[test]
fn elementary_field_yields_whole_value() {
    let mut stream = sample_ddr();
    stream.extend(dr(b'D', &[("IDEN", &terminated(b"HELLO WORLD"))]));
    let mut reader = open(stream);

    let subfield = reader.next_subfield().unwrap().unwrap();
    assert_eq!(subfield.tag(), "IDEN");
    assert_eq!(subfield.label(), "");
    // Field length 12 including the terminator; the value is the other 11.
    assert_eq!(subfield.len(), 11);
    assert_eq!(subfield.data(), b"HELLO WORLD");

    assert!(reader.next_subfield().unwrap().is_none());
}

#[test]
fn vector_with_explicit_sizes_round_trips() {
    let field = terminated(b"000100020003");
    let mut stream = sample_ddr();
    stream.extend(dr(b'D', &[("ELEV", &field)]));
    let mut reader = open(stream);

    let mut rebuilt = Vec::new();
    for expected in [("X", "0001"), ("Y", "0002"), ("Z", "0003")] {
        let subfield = reader.next_subfield().unwrap().unwrap();
        assert_eq!(subfield.tag(), "ELEV");
        assert_eq!(subfield.label(), expected.0);
        assert_eq!(subfield.data(), expected.1.as_bytes());
        assert_eq!(subfield.parse_int(), Some(expected.1.parse().unwrap()));
        rebuilt.extend_from_slice(subfield.data());
    }
    assert!(reader.next_subfield().unwrap().is_none());

    // Concatenating the yielded ranges plus the terminator reproduces the
    // original field bytes exactly.
    rebuilt.push(FT);
    assert_eq!(rebuilt, field);
}

#[test]
fn vector_without_sizes_scans_terminators() {
    let mut stream = ddr(&[(
        "ATTR",
        ddr_field('1', '0', "ATTRIBUTES", "NAME!CODE", "(2A)"),
    )]);
    let mut field = b"ridge".to_vec();
    field.push(UT);
    field.extend_from_slice(b"042");
    stream.extend(dr(b'D', &[("ATTR", &terminated(&field))]));
    let mut reader = open(stream);

    let subfield = reader.next_subfield().unwrap().unwrap();
    assert_eq!((subfield.label(), subfield.data()), ("NAME", &b"ridge"[..]));
    let subfield = reader.next_subfield().unwrap().unwrap();
    assert_eq!((subfield.label(), subfield.data()), ("CODE", &b"042"[..]));
    assert!(reader.next_subfield().unwrap().is_none());
}

#[test]
fn scanned_vector_yields_empty_trailing_subfield() {
    let mut stream = ddr(&[(
        "ATTR",
        ddr_field('1', '0', "ATTRIBUTES", "NAME!CODE", "(2A)"),
    )]);
    // The CODE value is absent: nothing between the unit terminator and
    // the field terminator. It must still come out as an empty subfield.
    let mut field = b"ridge".to_vec();
    field.push(UT);
    stream.extend(dr(b'D', &[("ATTR", &terminated(&field))]));
    let mut reader = open(stream);

    let subfield = reader.next_subfield().unwrap().unwrap();
    assert_eq!((subfield.label(), subfield.data()), ("NAME", &b"ridge"[..]));
    let subfield = reader.next_subfield().unwrap().unwrap();
    assert_eq!(subfield.label(), "CODE");
    assert!(subfield.is_empty());
    assert!(reader.next_subfield().unwrap().is_none());
}

#[test]
fn vector_stops_after_one_label_pass() {
    let mut stream = ddr(&[
        ("PAIR", ddr_field('1', '0', "PAIR", "A!B", "(2A(2))")),
        ("IDEN", ddr_field('0', '0', "IDENTIFICATION", "", "")),
    ]);
    // The PAIR field carries more bytes than one label pass covers; the
    // remainder is skipped and decoding resumes at the next field.
    stream.extend(dr(
        b'D',
        &[
            ("PAIR", &terminated(b"aabbccdd")),
            ("IDEN", &terminated(b"next")),
        ],
    ));
    let mut reader = open(stream);

    assert_eq!(reader.next_subfield().unwrap().unwrap().data(), b"aa");
    assert_eq!(reader.next_subfield().unwrap().unwrap().data(), b"bb");
    let subfield = reader.next_subfield().unwrap().unwrap();
    assert_eq!(subfield.tag(), "IDEN");
    assert_eq!(subfield.data(), b"next");
    assert!(reader.next_subfield().unwrap().is_none());
}

#[test]
fn array_cycles_cartesian_labels_to_field_end() {
    // Three rows of two 16-bit values; one value deliberately contains a
    // field terminator byte to prove explicit sizes never scan.
    let rows: [i16; 6] = [10, -2, 0x1E01, 40, 50, -60];
    let mut data = vec![0u8; 12];
    BigEndian::write_i16_into(&rows, &mut data);

    let mut stream = sample_ddr();
    stream.extend(dr(b'D', &[("CELL", &terminated(&data))]));
    let mut reader = open(stream);

    for (i, expected) in rows.iter().enumerate() {
        let subfield = reader.next_subfield().unwrap().unwrap();
        assert_eq!(subfield.tag(), "CELL");
        assert_eq!(subfield.label(), if i % 2 == 0 { "X" } else { "Y" });
        assert!(subfield.is_binary());
        assert_eq!(subfield.len(), 2);
        assert_eq!(BigEndian::read_i16(subfield.data()), *expected);
    }
    assert!(reader.next_subfield().unwrap().is_none());
}

#[test]
fn long_record_length_is_recovered_from_directory() {
    // 120000 data bytes cannot be stated in the 5-digit length field.
    let mut data = vec![b'7'; 120_000];
    data[0] = b'<';
    data[119_999] = b'>';
    let field = terminated(&data);

    let mut stream = ddr(&[("RAST", ddr_field('0', '0', "RASTER DATA", "", ""))]);
    stream.extend(build_record(
        b'D',
        b' ',
        b"  ",
        (4, 6, 6),
        true,
        &[("RAST", &field)],
    ));
    let mut reader = open(stream);

    let subfield = reader.next_subfield().unwrap().unwrap();
    assert_eq!(subfield.tag(), "RAST");
    assert_eq!(subfield.len(), 120_000);
    assert_eq!(subfield.data()[0], b'<');
    assert_eq!(subfield.data()[119_999], b'>');
    assert!(reader.next_subfield().unwrap().is_none());
}

#[test]
fn leaderless_records_reuse_the_last_directory() {
    let mut stream = ddr(&[("RAST", ddr_field('0', '0', "RASTER DATA", "", ""))]);
    // Terminal record, then two bare field-area blocks with no leader.
    stream.extend(dr(b'R', &[("RAST", &terminated(b"ROW1"))]));
    stream.extend(terminated(b"ROW2"));
    stream.extend(terminated(b"ROW3"));
    let mut reader = open(stream);

    for expected in [b"ROW1", b"ROW2", b"ROW3"] {
        let subfield = reader.next_subfield().unwrap().unwrap();
        assert_eq!(subfield.tag(), "RAST");
        assert_eq!(subfield.data(), expected);
    }
    // The short read at end of file terminates the leaderless loop.
    assert!(reader.next_subfield().unwrap().is_none());
    assert!(reader.next_subfield().unwrap().is_none());
}

#[test]
fn partial_trailing_leaderless_block_is_end_of_file() {
    let mut stream = ddr(&[("RAST", ddr_field('0', '0', "RASTER DATA", "", ""))]);
    stream.extend(dr(b'R', &[("RAST", &terminated(b"ROW1"))]));
    stream.extend(terminated(b"ROW2"));
    // A trailing fragment shorter than the field area is the stream
    // running out, not a truncated record.
    stream.extend_from_slice(b"RO");
    let mut reader = open(stream);

    assert_eq!(reader.next_subfield().unwrap().unwrap().data(), b"ROW1");
    assert_eq!(reader.next_subfield().unwrap().unwrap().data(), b"ROW2");
    assert!(reader.next_subfield().unwrap().is_none());
    assert!(reader.next_subfield().unwrap().is_none());
}

#[test]
fn yielded_tags_all_come_from_the_schema() {
    let mut stream = sample_ddr();
    stream.extend(dr(
        b'D',
        &[
            ("0001", &terminated(b"  1")),
            ("IDEN", &terminated(b"first")),
            ("ELEV", &terminated(b"000100020003")),
        ],
    ));
    stream.extend(dr(
        b'D',
        &[
            ("0001", &terminated(b"  2")),
            ("ELEV", &terminated(b"000400050006")),
        ],
    ));
    let mut reader = open(stream);

    let declared: Vec<String> = reader
        .descriptors()
        .iter()
        .map(|d| d.tag.clone())
        .collect();
    let mut count = 0;
    for subfield in reader.subfields() {
        let subfield = subfield.unwrap();
        assert!(declared.contains(&subfield.tag));
        count += 1;
    }
    assert_eq!(count, 1 + 1 + 3 + 1 + 3);
}

#[test]
fn unknown_tag_in_data_record_is_fatal() {
    let mut stream = ddr(&[("IDEN", ddr_field('0', '0', "IDENTIFICATION", "", ""))]);
    stream.extend(dr(b'D', &[("XXXX", &terminated(b"data"))]));
    let mut reader = open(stream);

    let err = reader.next_subfield().unwrap_err();
    assert!(matches!(err, SdtsError::UnknownTag(tag) if tag == "XXXX"));
}

#[test]
fn malformed_tag_width_fails_open() {
    for bad in [b'0', b'8'] {
        let mut stream = sample_ddr();
        stream[23] = bad;
        let err = SdtsReader::from_source(ByteSource::from_reader(Cursor::new(stream)))
            .unwrap_err();
        assert!(matches!(err, SdtsError::InvalidLeader(_)), "width {:?}", bad as char);
    }
}

#[test]
fn label_format_count_mismatch_fails_open() {
    let stream = ddr(&[("ELEV", ddr_field('1', '6', "ELEVATIONS", "X!Y", "(3I(4))"))]);
    let err = SdtsReader::from_source(ByteSource::from_reader(Cursor::new(stream))).unwrap_err();
    assert!(matches!(
        err,
        SdtsError::LabelFormatMismatch { labels: 2, formats: 3 }
    ));
}

#[test]
fn reserved_selector_two_fails_open() {
    let stream = ddr(&[("0002", ddr_field('0', '0', "USER AUGMENTED", "", ""))]);
    let err = SdtsReader::from_source(ByteSource::from_reader(Cursor::new(stream))).unwrap_err();
    assert!(matches!(err, SdtsError::ReservedTag(tag) if tag == "0002"));
}

#[test]
fn truncated_stream_is_reported_not_eof() {
    let mut stream = sample_ddr();
    let mut record = dr(b'D', &[("IDEN", &terminated(b"HELLO WORLD"))]);
    record.truncate(record.len() - 4);
    stream.extend(record);
    let mut reader = open(stream);

    let err = reader.next_subfield().unwrap_err();
    assert!(matches!(err, SdtsError::TruncatedRecord { .. }));
}

#[test]
fn open_reads_plain_and_gzipped_paths() {
    let mut stream = sample_ddr();
    stream.extend(dr(b'D', &[("IDEN", &terminated(b"on disk"))]));

    let dir = tempfile::tempdir().unwrap();

    let plain = dir.path().join("transfer.ddf");
    File::create(&plain).unwrap().write_all(&stream).unwrap();
    let mut reader = SdtsReader::open(&plain).unwrap();
    assert_eq!(reader.next_subfield().unwrap().unwrap().data(), b"on disk");

    let gzipped = dir.path().join("transfer.ddf.gz");
    let mut encoder = GzEncoder::new(File::create(&gzipped).unwrap(), Compression::default());
    encoder.write_all(&stream).unwrap();
    encoder.finish().unwrap();
    let mut reader = SdtsReader::open(&gzipped).unwrap();
    assert_eq!(reader.file_title(), "TEST TRANSFER");
    assert_eq!(reader.next_subfield().unwrap().unwrap().data(), b"on disk");
}
