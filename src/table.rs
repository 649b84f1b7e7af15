use std::collections::HashSet;
use std::io;

use serde::{Deserialize, Serialize};

use crate::design::Design;
use crate::error::{BibdError, Result};

/// Column names of the exported design, in order.
pub const TABLE_HEADER: [&str; 3] = ["Block", "Tratamiento_ID", "Nombre"];

/// One (block, treatment) membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    /// 1-based position of the block in the design.
    #[serde(rename = "Block")]
    pub block_index: usize,
    #[serde(rename = "Tratamiento_ID")]
    pub treatment_code: String,
    #[serde(rename = "Nombre")]
    pub treatment_label: String,
}

/// Block-major listing of a design, ready for display or CSV export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesignTable {
    rows: Vec<TableRow>,
}

impl DesignTable {
    /// Builds the table from rows of treatment indices, in the order given.
    ///
    /// Without `labels` each treatment is named `Treatment {index + 1}`.
    ///
    /// # Errors
    ///
    /// Returns `BibdError::LabelIndexOutOfRange` when a treatment index has no label.
    pub fn from_rows<I, R>(blocks: I, labels: Option<&[String]>) -> Result<Self>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[usize]>,
    {
        let mut rows = Vec::new();
        for (bi, block) in blocks.into_iter().enumerate() {
            for &t in block.as_ref() {
                let treatment_label = match labels {
                    Some(labels) => labels
                        .get(t)
                        .cloned()
                        .ok_or(BibdError::LabelIndexOutOfRange { index: t, len: labels.len() })?,
                    None => format!("Treatment {}", t + 1),
                };
                rows.push(TableRow {
                    block_index: bi + 1,
                    treatment_code: treatment_code(t),
                    treatment_label,
                });
            }
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Writes the header and one line per row, `\n`-terminated, quoting only where needed.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);
        wtr.write_record(TABLE_HEADER)?;
        for row in &self.rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        let csv =
            String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(csv)
    }
}

/// Tabulates a design, see [`DesignTable::from_rows`].
pub fn to_table(design: &Design, labels: Option<&[String]>) -> Result<DesignTable> {
    design.to_table(labels)
}

/// Letter code for a treatment: `A`..`Z`, then `AA`, `AB`, .. `ZZ`, `AAA`.
///
/// Defined for every `usize`, including `usize::MAX`.
pub fn treatment_code(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index;
    loop {
        letters.push(char::from(b'A' + (n % 26) as u8));
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    letters.iter().rev().collect()
}

/// Inverse of [`treatment_code`]; `None` for anything but upper-case ASCII letters.
pub fn treatment_index(code: &str) -> Option<usize> {
    if code.is_empty() {
        return None;
    }
    let mut acc: Option<usize> = None;
    for c in code.bytes() {
        if !c.is_ascii_uppercase() {
            return None;
        }
        let digit = (c - b'A') as usize;
        acc = Some(match acc {
            None => digit,
            Some(prefix) => prefix.checked_add(1)?.checked_mul(26)?.checked_add(digit)?,
        });
    }
    acc
}

/// Reads treatment names from a CSV with a header row.
///
/// Takes the first column unless `column` names another one. With `distinct`,
/// only the first occurrence of each name is kept, which suits long-format
/// tasting sheets with one row per score.
///
/// # Errors
///
/// Returns `BibdError::MissingColumn` when `column` is not in the header, and
/// `BibdError::MalformedTable` for a data row too short to reach the column.
pub fn read_labels<R: io::Read>(
    reader: R,
    column: Option<&str>,
    distinct: bool,
) -> Result<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let position = match column {
        Some(name) => rdr
            .headers()?
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| BibdError::MissingColumn(name.to_string()))?,
        None => 0,
    };

    let mut seen = HashSet::new();
    let mut labels = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let label = match record.get(position) {
            Some(field) => field.to_string(),
            None => {
                return Err(BibdError::MalformedTable {
                    row: i + 1,
                    reason: format!("{} fields, label column is {}", record.len(), position + 1),
                })
            }
        };
        if distinct && !seen.insert(label.clone()) {
            continue;
        }
        labels.push(label);
    }
    Ok(labels)
}

/// Reconstructs block membership from an exported design table.
///
/// Rows must be block-major with contiguous 1-based block numbers; treatment
/// order inside each block is kept as written.
pub fn parse_design_csv<R: io::Read>(reader: R) -> Result<Vec<Vec<usize>>> {
    let malformed = |row: usize, reason: String| BibdError::MalformedTable { row, reason };

    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    if !headers.iter().eq(TABLE_HEADER.iter().copied()) {
        return Err(malformed(0, format!("expected header {}", TABLE_HEADER.join(","))));
    }

    let mut blocks: Vec<Vec<usize>> = Vec::new();
    let mut block_start_rows: Vec<usize> = Vec::new();
    for (i, record) in rdr.deserialize::<TableRow>().enumerate() {
        let row = i + 1;
        let record = record?;
        let t = treatment_index(&record.treatment_code).ok_or_else(|| {
            malformed(row, format!("unknown treatment code {:?}", record.treatment_code))
        })?;

        let current_block = blocks.len();
        if record.block_index == current_block + 1 {
            blocks.push(vec![t]);
            block_start_rows.push(row);
        } else if current_block > 0 && record.block_index == current_block {
            let current = &mut blocks[current_block - 1];
            if current.contains(&t) {
                let reason = format!(
                    "treatment {} repeated in block {}",
                    record.treatment_code, record.block_index
                );
                return Err(malformed(row, reason));
            }
            current.push(t);
        } else {
            return Err(malformed(row, format!("block {} out of sequence", record.block_index)));
        }
    }

    if let Some(first) = blocks.first() {
        if let Some(pos) = blocks.iter().position(|b| b.len() != first.len()) {
            return Err(malformed(
                block_start_rows[pos],
                format!(
                    "block {} has {} treatments, expected {}",
                    pos + 1,
                    blocks[pos].len(),
                    first.len()
                ),
            ));
        }
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pair_blocks() -> Vec<Vec<usize>> {
        vec![vec![0, 1], vec![0, 2], vec![1, 2]]
    }

    #[test]
    fn test_treatment_codes() {
        assert_eq!(treatment_code(0), "A");
        assert_eq!(treatment_code(25), "Z");
        assert_eq!(treatment_code(26), "AA");
        assert_eq!(treatment_code(27), "AB");
        assert_eq!(treatment_code(701), "ZZ");
        assert_eq!(treatment_code(702), "AAA");
    }

    #[test]
    fn test_treatment_index_rejects_garbage() {
        assert_eq!(treatment_index(""), None);
        assert_eq!(treatment_index("a"), None);
        assert_eq!(treatment_index("A1"), None);
        assert_eq!(treatment_index("AA"), Some(26));
        // one letter past the widest usize code
        assert_eq!(treatment_index(&"Z".repeat(20)), None);
    }

    #[test]
    fn test_treatment_code_at_usize_max() {
        let code = treatment_code(usize::MAX);
        assert!(code.bytes().all(|c| c.is_ascii_uppercase()));
        assert_eq!(treatment_index(&code), Some(usize::MAX));
        assert_eq!(treatment_index(&treatment_code(usize::MAX - 1)), Some(usize::MAX - 1));
    }

    #[test]
    fn test_csv_export_exact() {
        let table = DesignTable::from_rows(pair_blocks(), None).unwrap();
        let expected = "Block,Tratamiento_ID,Nombre\n\
                        1,A,Treatment 1\n\
                        1,B,Treatment 2\n\
                        2,A,Treatment 1\n\
                        2,C,Treatment 3\n\
                        3,B,Treatment 2\n\
                        3,C,Treatment 3\n";
        assert_eq!(table.to_csv_string().unwrap(), expected);
    }

    #[test]
    fn test_csv_export_quotes_labels() {
        let labels =
            vec!["Geisha, Panamá".to_string(), "Caturra".to_string(), "Bourbon".to_string()];
        let table = DesignTable::from_rows(pair_blocks(), Some(labels.as_slice())).unwrap();
        let csv = table.to_csv_string().unwrap();
        assert!(csv.contains("1,A,\"Geisha, Panamá\"\n"));
        assert!(csv.contains("3,C,Bourbon\n"));
    }

    #[test]
    fn test_short_labels_fail() {
        let labels = vec!["Caturra".to_string(), "Bourbon".to_string()];
        match DesignTable::from_rows(pair_blocks(), Some(labels.as_slice())) {
            Err(BibdError::LabelIndexOutOfRange { index, len }) => {
                assert_eq!(index, 2);
                assert_eq!(len, 2);
            }
            other => panic!("expected label error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_round_trip() {
        let table = DesignTable::from_rows(pair_blocks(), None).unwrap();
        let csv = table.to_csv_string().unwrap();
        assert_eq!(parse_design_csv(csv.as_bytes()).unwrap(), pair_blocks());
    }

    #[test]
    fn test_parse_rejects_bad_header() {
        let csv = "Bloque,Tratamiento_ID,Nombre\n1,A,x\n";
        assert!(matches!(
            parse_design_csv(csv.as_bytes()),
            Err(BibdError::MalformedTable { row: 0, .. })
        ));
    }

    #[test]
    fn test_parse_rejects_bad_rows() {
        let unknown = "Block,Tratamiento_ID,Nombre\n1,A,x\n1,b,y\n";
        assert!(matches!(
            parse_design_csv(unknown.as_bytes()),
            Err(BibdError::MalformedTable { row: 2, .. })
        ));

        let skipped = "Block,Tratamiento_ID,Nombre\n1,A,x\n3,B,y\n";
        assert!(matches!(
            parse_design_csv(skipped.as_bytes()),
            Err(BibdError::MalformedTable { row: 2, .. })
        ));

        let repeated = "Block,Tratamiento_ID,Nombre\n1,A,x\n1,A,x\n";
        assert!(matches!(
            parse_design_csv(repeated.as_bytes()),
            Err(BibdError::MalformedTable { row: 2, .. })
        ));

        let ragged = "Block,Tratamiento_ID,Nombre\n1,A,x\n1,B,y\n2,A,x\n";
        assert!(matches!(
            parse_design_csv(ragged.as_bytes()),
            Err(BibdError::MalformedTable { row: 3, .. })
        ));
    }

    #[test]
    fn test_read_labels_first_column() {
        let csv = "Variedad,Origen\nGeisha,Panamá\nCaturra,Colombia\n";
        assert_eq!(read_labels(csv.as_bytes(), None, false).unwrap(), vec!["Geisha", "Caturra"]);
    }

    #[test]
    fn test_read_labels_rejects_short_row() {
        let csv = "Catador_ID,Variedad_Nombre
1,Geisha
2
3,Bourbon
";
        match read_labels(csv.as_bytes(), Some("Variedad_Nombre"), false) {
            Err(BibdError::MalformedTable { row, .. }) => assert_eq!(row, 2),
            other => panic!("expected malformed table, got {:?}", other),
        }

        // the first column is still present on the short row
        let ids = read_labels(csv.as_bytes(), None, false).unwrap();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_read_labels_named_distinct_column() {
        let csv = "Catador_ID,Variedad_Codigo,Variedad_Nombre,Puntaje_SCA\n\
                   1,A,Geisha,86.5\n\
                   1,B,Caturra,84.0\n\
                   2,A,Geisha,85.25\n\
                   2,C,Bourbon,83.5\n";
        let labels = read_labels(csv.as_bytes(), Some("Variedad_Nombre"), true).unwrap();
        assert_eq!(labels, vec!["Geisha", "Caturra", "Bourbon"]);

        let all = read_labels(csv.as_bytes(), Some("Variedad_Nombre"), false).unwrap();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_read_labels_missing_column() {
        let csv = "Variedad\nGeisha\n";
        assert!(matches!(
            read_labels(csv.as_bytes(), Some("Nombre"), false),
            Err(BibdError::MissingColumn(name)) if name == "Nombre"
        ));
    }

    proptest! {
        #[test]
        fn treatment_code_round_trips(index in 0usize..1_000_000) {
            let code = treatment_code(index);
            prop_assert!(code.bytes().all(|c| c.is_ascii_uppercase()));
            prop_assert_eq!(treatment_index(&code), Some(index));
        }

        #[test]
        fn treatment_code_round_trips_near_usize_max(offset in 0usize..1_000_000) {
            let index = usize::MAX - offset;
            prop_assert_eq!(treatment_index(&treatment_code(index)), Some(index));
        }

        #[test]
        fn table_round_trips_block_membership(
            blocks in proptest::collection::vec(
                proptest::collection::btree_set(0usize..40, 3),
                1..20,
            )
        ) {
            let blocks: Vec<Vec<usize>> =
                blocks.into_iter().map(|b| b.into_iter().collect()).collect();
            let table = DesignTable::from_rows(&blocks, None).unwrap();
            let csv = table.to_csv_string().unwrap();
            prop_assert_eq!(parse_design_csv(csv.as_bytes()).unwrap(), blocks);
        }
    }
}
