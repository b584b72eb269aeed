
use anyhow::Context;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

fn is_gzipped(filename: &Path) -> bool {
    filename.extension().unwrap_or_default() == "gz"
}

/// Opens a file for reading, transparently decompressing `.gz`
/// # Errors
/// * if the file does not open
pub fn open_reader(filename: &Path) -> anyhow::Result<Box<dyn Read>> {
    let file = File::open(filename)
        .with_context(|| format!("Error while opening {filename:?}:"))?;
    let reader: Box<dyn Read> = if is_gzipped(filename) {
        Box::new(flate2::read::MultiGzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

/// Creates a file for writing, compressing when the name ends in `.gz`
/// # Errors
/// * if the file cannot be created
pub fn create_writer(filename: &Path) -> anyhow::Result<Box<dyn Write>> {
    let file = File::create(filename)
        .with_context(|| format!("Error while creating {filename:?}:"))?;
    let writer: Box<dyn Write> = if is_gzipped(filename) {
        Box::new(flate2::write::GzEncoder::new(BufWriter::new(file), flate2::Compression::default()))
    } else {
        Box::new(BufWriter::new(file))
    };
    Ok(writer)
}

/// Loads a JSON file (optionally gzipped) into any deserializable type
/// # Errors
/// * if the file does not open
/// * if deserialization fails
pub fn load_json<T: serde::de::DeserializeOwned>(filename: &Path) -> anyhow::Result<T> {
    let reader = open_reader(filename)?;
    let result: T = serde_json::from_reader(reader)
        .with_context(|| format!("Error while deserializing {filename:?}:"))?;
    Ok(result)
}

/// Saves any serializable type as pretty JSON, gzipped if the name ends in `.gz`
/// # Errors
/// * if the file cannot be created or written
/// * if serialization fails
pub fn save_json<T: serde::Serialize>(data: &T, out_filename: &Path) -> anyhow::Result<()> {
    let mut writer = create_writer(out_filename)?;
    serde_json::to_writer_pretty(&mut writer, data)
        .with_context(|| format!("Error while serializing {out_filename:?}:"))?;
    writer.flush()
        .with_context(|| format!("Error while flushing output to {out_filename:?}:"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_plain_and_gz() {
        let folder = tempfile::tempdir().unwrap();
        let data: BTreeMap<String, u64> = [("chr1".to_string(), 10), ("chr2".to_string(), 20)].into_iter().collect();
        for name in ["data.json", "data.json.gz"] {
            let filename = folder.path().join(name);
            save_json(&data, &filename).unwrap();
            let loaded: BTreeMap<String, u64> = load_json(&filename).unwrap();
            assert_eq!(loaded, data);
        }

        // the compressed copy really is compressed
        let mut raw = vec![];
        File::open(folder.path().join("data.json.gz")).unwrap().read_to_end(&mut raw).unwrap();
        assert_eq!(&raw[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn test_missing_file() {
        let folder = tempfile::tempdir().unwrap();
        let result: anyhow::Result<serde_json::Value> = load_json(&folder.path().join("absent.json"));
        assert!(result.is_err());
    }
}
