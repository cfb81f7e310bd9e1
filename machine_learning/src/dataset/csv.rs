use std::{fs, path::Path};

use ndarray::Array2;

use crate::{MlErr, Result};

/// Reads the named columns of a comma separated file with a header line.
///
/// # Arguments
/// * `path` - The file to read.
/// * `columns` - The header names of the columns to keep, in the order they should be returned.
///
/// # Returns
/// The columns as the rows of a `(columns, samples)` array.
pub fn read_columns(path: &Path, columns: &[&str]) -> Result<Array2<f32>> {
    let content = fs::read_to_string(path)?;
    parse_columns(&path.display().to_string(), &content, columns)
}

fn parse_columns(file: &str, content: &str, columns: &[&str]) -> Result<Array2<f32>> {
    let parse_err = |line: usize, msg: String| MlErr::Parse {
        file: file.to_string(),
        line,
        msg,
    };

    let mut lines = content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let (header_line, header) = lines
        .next()
        .ok_or_else(|| parse_err(1, "missing header".into()))?;
    let names: Vec<&str> = header.split(',').map(unquote).collect();

    let indices = columns
        .iter()
        .map(|column| {
            names
                .iter()
                .position(|name| name == column)
                .ok_or_else(|| parse_err(header_line, format!("missing column '{column}'")))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut data = vec![Vec::new(); columns.len()];

    for (i, line) in lines {
        let values: Vec<&str> = line.split(',').map(unquote).collect();
        if values.len() != names.len() {
            return Err(parse_err(
                i,
                format!("expected {} values, got {}", names.len(), values.len()),
            ));
        }

        for (column, &idx) in data.iter_mut().zip(&indices) {
            let value = values[idx]
                .parse::<f32>()
                .map_err(|_| parse_err(i, format!("cannot parse '{}' as f32", values[idx])))?;
            column.push(value);
        }
    }

    let samples = data.first().map_or(0, Vec::len);
    let flat: Vec<f32> = data.into_iter().flatten().collect();
    Ok(Array2::from_shape_vec((columns.len(), samples), flat)?)
}

fn unquote(s: &str) -> &str {
    s.trim().trim_matches('"')
}
