/*
Binary persistence for the action-value table.

On-disk layout, all little-endian:

    u32  sigLen
    u8[] sig       (sigLen bytes, child names each terminated by ';')
    u64  numStates
    repeat numStates:
        u64  state
        u32  rowLen
        f64[rowLen] row

The file is only consumed when the signature matches the current child set;
it is not portable across hosts with differing float representations.
*/

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use super::policy::QTable;
use super::ports::ChildPrefetcher;

// Reject absurd lengths before allocating for them.
const MAX_SIG_LEN: u32 = 1 << 16;
const MAX_ROW_LEN: u32 = 1 << 16;

// Stable identity of the ordered child set.
pub fn children_signature(children: &[Box<dyn ChildPrefetcher>]) -> String {
    let mut signature = String::new();
    for child in children {
        signature.push_str(child.name());
        signature.push(';');
    }
    signature
}

pub fn sanitise(name: &str) -> String {
    name.bytes()
        .map(|byte| {
            if byte.is_ascii_alphanumeric() {
                byte as char
            } else {
                '_'
            }
        })
        .collect()
}

pub fn default_qtable_path(cache_name: &str, fallback: &str) -> PathBuf {
    let base = if cache_name.is_empty() {
        fallback
    } else {
        cache_name
    };
    PathBuf::from(format!("qtable_{}.bin", sanitise(base)))
}

#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(QTable),
    Missing,
    SignatureMismatch { saved: String },
    Malformed { field: &'static str },
}

pub fn save_qtable(path: &Path, signature: &str, table: &QTable) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);

    out.write_all(&(signature.len() as u32).to_le_bytes())?;
    out.write_all(signature.as_bytes())?;

    out.write_all(&(table.len() as u64).to_le_bytes())?;
    for (&state, row) in table.iter() {
        out.write_all(&state.to_le_bytes())?;
        out.write_all(&(row.len() as u32).to_le_bytes())?;
        for &value in row {
            out.write_all(&value.to_le_bytes())?;
        }
    }
    out.flush()
}

// A partial read never escapes: the table is built locally and only
// returned once the whole stream has parsed.
pub fn load_qtable(path: &Path, expected_signature: &str) -> LoadOutcome {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(_) => return LoadOutcome::Missing,
    };
    let mut input = BufReader::new(file);

    let sig_len = match read_u32(&mut input) {
        Some(len) if len <= MAX_SIG_LEN => len,
        _ => return LoadOutcome::Malformed {
            field: "signature length",
        },
    };
    let mut sig_bytes = vec![0u8; sig_len as usize];
    if input.read_exact(&mut sig_bytes).is_err() {
        return LoadOutcome::Malformed { field: "signature" };
    }
    let saved = String::from_utf8_lossy(&sig_bytes).into_owned();
    if saved != expected_signature {
        return LoadOutcome::SignatureMismatch { saved };
    }

    let num_states = match read_u64(&mut input) {
        Some(count) => count,
        None => return LoadOutcome::Malformed {
            field: "state count",
        },
    };

    let mut table = QTable::new();
    for _ in 0..num_states {
        let state = match read_u64(&mut input) {
            Some(state) => state,
            None => return LoadOutcome::Malformed { field: "state key" },
        };
        let row_len = match read_u32(&mut input) {
            Some(len) if len <= MAX_ROW_LEN => len,
            _ => return LoadOutcome::Malformed { field: "row length" },
        };
        let mut row = Vec::with_capacity(row_len as usize);
        for _ in 0..row_len {
            match read_f64(&mut input) {
                Some(value) => row.push(value),
                None => return LoadOutcome::Malformed { field: "row values" },
            }
        }
        table.insert_row(state, row);
    }

    LoadOutcome::Loaded(table)
}

fn read_u32(input: &mut impl Read) -> Option<u32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf).ok()?;
    Some(u32::from_le_bytes(buf))
}

fn read_u64(input: &mut impl Read) -> Option<u64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf).ok()?;
    Some(u64::from_le_bytes(buf))
}

fn read_f64(input: &mut impl Read) -> Option<f64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf).ok()?;
    Some(f64::from_le_bytes(buf))
}
