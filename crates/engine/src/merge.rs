use partition_source::vstack_all;
use polars::prelude::*;
use std::collections::HashMap;

/// Concatenates frames whose column sets differ.
///
/// The output holds the union of all columns in order of first appearance.
/// Cells for a column a frame does not have are null. When frames disagree on
/// a column's type, the type of the first frame holding it wins and the others
/// are cast to it.
pub fn diagonal_concat(frames: Vec<DataFrame>) -> PolarsResult<DataFrame> {
    let frames: Vec<DataFrame> = frames.into_iter().filter(|f| f.width() > 0).collect();
    if frames.len() <= 1 {
        return Ok(frames.into_iter().next().unwrap_or_else(DataFrame::empty));
    }

    let mut columns: Vec<String> = Vec::new();
    let mut dtypes: HashMap<String, DataType> = HashMap::new();
    for frame in &frames {
        for series in frame.get_columns() {
            let name = series.name().to_string();
            if !dtypes.contains_key(&name) {
                dtypes.insert(name.clone(), series.dtype().clone());
                columns.push(name);
            }
        }
    }

    let mut aligned = Vec::with_capacity(frames.len());
    for frame in frames {
        let height = frame.height();
        let mut series = Vec::with_capacity(columns.len());
        for name in &columns {
            let dtype = &dtypes[name];
            match frame.column(name) {
                Ok(s) if s.dtype() == dtype => series.push(s.clone()),
                Ok(s) => series.push(s.cast(dtype)?),
                Err(_) => series.push(Series::full_null(name, height, dtype)),
            }
        }
        aligned.push(DataFrame::new(series)?);
    }

    vstack_all(aligned)
}
