use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for reading an input file format.
///
/// Implementors handle format-specific parsing; opening and buffering files is shared.
pub trait InputFile {
    /// The value produced by a successful parse.
    type Output;

    /// The error type for parsing and I/O failures.
    type Error: Error + From<io::Error>;

    /// Reads and parses the format from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or the reader fails.
    fn read_from(reader: &mut impl BufRead) -> Result<Self::Output, Self::Error>;

    /// Reads and parses the format from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self::Output, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }
}

/// A text artifact consumed verbatim by the docking engine.
///
/// The byte layout is part of the contract, so implementors write exact field widths.
pub trait TextArtifact {
    /// Writes the artifact to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(&self, writer: &mut impl Write) -> io::Result<()>;

    /// Renders the artifact into a string.
    fn render(&self) -> String {
        let mut buffer = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Writes the artifact to a file path, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    fn write_to_path<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()
    }
}
