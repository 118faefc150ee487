//! Translation of the 8-bit label/text encoding used on the diskettes.
//!
//! The lower half is ASCII. The upper half carries national letters,
//! currency and bracket glyphs. Bytes with no assigned glyph decode to
//! [`PLACEHOLDER`] so that decoding never fails.

/// Shown for bytes that have no glyph.
pub const PLACEHOLDER: char = '\u{FFFD}';

const NEWLINE: char = '\n';
const BACKSPACE: char = '\u{8}';

// 0xA0..=0xBF
const SYMBOLS: [char; 32] = [
    ' ', '¡', '¢', '£', '$', '¥', '¤', '§', '¨', '©', 'ª', '«', '¬', '-', '®', '¯', //
    '°', '±', '²', '³', '´', 'µ', '¶', '·', '¸', '¹', 'º', '»', '[', ']', '{', '}',
];

// 0xC0..=0xFF
const LETTERS: [char; 64] = [
    'À', 'Á', 'Â', 'Ã', 'Ä', 'Å', 'Æ', 'Ç', 'È', 'É', 'Ê', 'Ë', 'Ì', 'Í', 'Î', 'Ï', //
    'Ð', 'Ñ', 'Ò', 'Ó', 'Ô', 'Õ', 'Ö', '×', 'Ø', 'Ù', 'Ú', 'Û', 'Ü', 'Ý', 'Þ', 'ß', //
    'à', 'á', 'â', 'ã', 'ä', 'å', 'æ', 'ç', 'è', 'é', 'ê', 'ë', 'ì', 'í', 'î', 'ï', //
    'ð', 'ñ', 'ò', 'ó', 'ô', 'õ', 'ö', '÷', 'ø', 'ù', 'ú', 'û', 'ü', 'ý', 'þ', 'ÿ',
];

const fn build_table() -> [char; 256] {
    let mut table = [PLACEHOLDER; 256];
    let mut i = 0x20;
    while i < 0x7f {
        table[i] = i as u8 as char;
        i += 1;
    }
    table[0x08] = BACKSPACE;
    table[0x09] = '\t';
    table[0x0a] = NEWLINE;
    table[0x0d] = NEWLINE;
    // C1 duplicates of the line controls
    table[0x85] = NEWLINE;
    table[0x88] = BACKSPACE;
    let mut i = 0;
    while i < SYMBOLS.len() {
        table[0xa0 + i] = SYMBOLS[i];
        i += 1;
    }
    let mut i = 0;
    while i < LETTERS.len() {
        table[0xc0 + i] = LETTERS[i];
        i += 1;
    }
    table
}

static TABLE: [char; 256] = build_table();

pub fn decode_byte(byte: u8) -> char {
    TABLE[byte as usize]
}

pub fn decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| decode_byte(b)).collect()
}

/// True if `c` is something a file or volume name may legitimately contain.
pub fn is_name_char(c: char) -> bool {
    c != PLACEHOLDER && !c.is_control()
}
