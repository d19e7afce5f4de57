use std::path::Path;

use tracing::info;

use common::{Error, Result, Universe};

/// Header names accepted for the symbol column, in preference order.
const SYMBOL_COLUMNS: [&str; 3] = ["Symbol", "tradingsymbol", "symbol"];

/// Load the instrument universe from a CSV file.
///
/// Uses the first matching symbol column (`Symbol`, `tradingsymbol`,
/// `symbol`), falling back to the first column. Blank and repeated symbols
/// are dropped; file order is kept.
pub fn load_universe(path: impl AsRef<Path>) -> Result<Universe> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;

    let headers = reader.headers()?.clone();
    let column = SYMBOL_COLUMNS
        .iter()
        .find_map(|name| headers.iter().position(|h| h.trim() == *name))
        .unwrap_or(0);

    let mut symbols = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(symbol) = record.get(column) {
            symbols.push(symbol.to_string());
        }
    }

    let universe = Universe::from_symbols(symbols);
    if universe.is_empty() {
        return Err(Error::InvalidConfiguration(format!(
            "universe file '{}' contains no symbols",
            path.display()
        )));
    }
    info!(path = %path.display(), symbols = universe.len(), "Universe loaded");
    Ok(universe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn picks_symbol_column_by_name() {
        let f = write_csv(
            "Company Name,Industry,Symbol\nInfosys,IT,INFY\nTCS Ltd,IT,TCS\nInfosys,IT,INFY\n",
        );
        let u = load_universe(f.path()).unwrap();
        assert_eq!(u.symbols(), &["INFY", "TCS"]);
    }

    #[test]
    fn accepts_tradingsymbol_header() {
        let f = write_csv("name,tradingsymbol\nState Bank,SBIN\nReliance,RELIANCE\n");
        let u = load_universe(f.path()).unwrap();
        assert_eq!(u.symbols(), &["SBIN", "RELIANCE"]);
    }

    #[test]
    fn falls_back_to_first_column() {
        let f = write_csv("ticker,weight\nHDFC,1\n,2\nITC,3\n");
        let u = load_universe(f.path()).unwrap();
        assert_eq!(u.symbols(), &["HDFC", "ITC"]);
    }

    #[test]
    fn empty_universe_is_a_configuration_error() {
        let f = write_csv("Symbol\n");
        assert!(matches!(load_universe(f.path()), Err(Error::InvalidConfiguration(_))));
    }
}
