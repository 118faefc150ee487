//! Converter for the space-compressed text files found on these diskettes.
//!
//! Each line starts with a 3-byte header; a header whose third byte is
//! 0x1F ends the text. Bytes 0x80 and up encode runs of spaces or the end
//! of a line, and a NUL ends the line and starts the next header.

use std::io::{self, Read, Write};

const END_OF_TEXT: u8 = 0x1f;
const BLANK_LINE: u8 = 0xc8;
const SPACE_RUN_BASE: u8 = 0x80;
/// Mid-line space runs are limited to fewer than this many spaces.
const MID_LINE_RUN_LIMIT: u8 = 0x89;

fn is_printable(byte: u8) -> bool {
    (0x20..0x7f).contains(&byte)
}

fn write_spaces<W: Write>(out: &mut W, code: u8) -> io::Result<usize> {
    let count = code.saturating_sub(SPACE_RUN_BASE) as usize;
    out.write_all(&vec![b' '; count])?;
    Ok(count)
}

/// Converts the whole of `input` to plain text on `output`.
pub fn convert<R: Read, W: Write>(mut input: R, mut output: W) -> io::Result<()> {
    let mut data = Vec::new();
    input.read_to_end(&mut data)?;

    let mut pos = 0;
    'text: while pos + 3 <= data.len() {
        let header = &data[pos..pos + 3];
        pos += 3;
        if header[2] == END_OF_TEXT {
            break;
        }
        let mut line_length = 0;
        loop {
            let Some(&c) = data.get(pos) else {
                break 'text;
            };
            pos += 1;
            if is_printable(c) {
                line_length += 1;
                output.write_all(&[c])?;
            } else if c == 0 {
                // the NUL is the first byte of the next header
                pos -= 1;
                output.write_all(b"\n")?;
                break;
            } else if line_length == 0 {
                if c < BLANK_LINE {
                    line_length += write_spaces(&mut output, c)?;
                } else if c == BLANK_LINE {
                    output.write_all(b"\n")?;
                    break;
                } else {
                    write!(output, "[{:02x}]", c)?;
                }
            } else if c < MID_LINE_RUN_LIMIT {
                line_length += write_spaces(&mut output, c)?;
            } else {
                output.write_all(b"\n")?;
                break;
            }
        }
    }
    output.flush()
}
