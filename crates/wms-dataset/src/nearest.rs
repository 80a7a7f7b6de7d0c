//! Time variable selection and nearest time step lookup.

use chrono::{DateTime, Utc};
use tracing::debug;

use netcdf_parser::{NcDataset, VariableInfo};
use wms_common::time::{date2num, num2date};
use wms_common::{Calendar, CfTimeUnits, WmsError, WmsResult};

/// Index of the first element strictly greater than `x`.
///
/// `sorted` must be ascending; equal values sit left of the returned index.
pub fn bisect_right(sorted: &[f64], x: f64) -> usize {
    sorted.partition_point(|v| *v <= x)
}

/// Time step for an encoded request time.
///
/// An exact match resolves to the following step, a time past the end to
/// the last step and a time before the start to step 0. `None` only when
/// `times` is empty.
pub fn nearest_time_index(times: &[f64], num_date: f64) -> Option<(usize, f64)> {
    if times.is_empty() {
        return None;
    }
    let mut index = bisect_right(times, num_date);
    if index == times.len() {
        index -= 1;
    }
    Some((index, times[index]))
}

/// Among several time variables, the one that is a dimension of `var`.
pub fn find_appropriate_time<'a>(
    var: &VariableInfo,
    time_vars: &'a [VariableInfo],
) -> Option<&'a VariableInfo> {
    time_vars.iter().find(|t| var.dimensions.contains(&t.name))
}

/// The time variable to use for `var_name`.
///
/// A single `standard_name = time` variable is used as is. With several,
/// the one the layer variable is dimensioned by wins, then the first one
/// named in its `coordinates` attribute.
pub fn time_variable(nc: &dyn NcDataset, var_name: &str) -> WmsResult<VariableInfo> {
    let mut time_vars = nc.variables_by_standard_name(&["time"]);

    match time_vars.len() {
        0 => Err(WmsError::NoTimeVariable(var_name.to_string())),
        1 => Ok(time_vars.remove(0)),
        _ => {
            let var = nc
                .variable(var_name)
                .ok_or_else(|| WmsError::LayerNotFound(var_name.to_string()))?;

            if let Some(found) = find_appropriate_time(&var, &time_vars) {
                return Ok(found.clone());
            }

            let coordinates = var.attr_str("coordinates").unwrap_or_default();
            coordinates
                .split_whitespace()
                .find_map(|c| time_vars.iter().find(|t| t.name == c))
                .cloned()
                .ok_or_else(|| WmsError::NoTimeVariable(var_name.to_string()))
        }
    }
}

/// Units and calendar of a time variable; a missing calendar means
/// `gregorian`.
pub fn time_coding(time_var: &VariableInfo) -> WmsResult<(CfTimeUnits, Calendar)> {
    let units = time_var.attr_str("units").ok_or_else(|| {
        WmsError::DataReadError(format!("time variable {} has no units", time_var.name))
    })?;
    let units = CfTimeUnits::parse(units)?;
    let calendar = match time_var.attr_str("calendar") {
        Some(name) => name.parse::<Calendar>()?,
        None => Calendar::Standard,
    };
    Ok((units, calendar))
}

/// Encode `time` in the coding of `time_var`, rounded half away from zero.
pub fn encode_time(time_var: &VariableInfo, time: &DateTime<Utc>) -> WmsResult<f64> {
    let (units, calendar) = time_coding(time_var)?;
    Ok(date2num(time, &units, calendar)?.round())
}

/// Decode raw time values.
///
/// Non-finite values (unmasked fill values) are skipped, so positions in
/// the result only match positions in the variable when every value is
/// valid. Time step indices come from [`nearest_time`], never from here.
pub fn decode_times(time_var: &VariableInfo, values: &[f64]) -> WmsResult<Vec<DateTime<Utc>>> {
    let (units, calendar) = time_coding(time_var)?;
    values
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| num2date(*v, &units, calendar).map_err(WmsError::from))
        .collect()
}

/// Nearest time step of `var_name` to `time`, as `(index, raw value)`.
pub fn nearest_time(
    nc: &dyn NcDataset,
    var_name: &str,
    time: &DateTime<Utc>,
) -> WmsResult<(usize, f64)> {
    let time_var = time_variable(nc, var_name)?;
    let num_date = encode_time(&time_var, time)?;
    let times = nc.read_values(&time_var.name)?;

    let (index, value) = nearest_time_index(&times, num_date)
        .ok_or_else(|| WmsError::DataNotAvailable(time.to_rfc3339()))?;

    debug!(
        variable = %var_name,
        time_variable = %time_var.name,
        num_date,
        index,
        "Resolved nearest time"
    );
    Ok((index, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use netcdf_parser::{AttrValue, MemoryDataset};

    #[test]
    fn test_bisect_right() {
        let t = [0.0, 6.0, 12.0, 18.0];
        assert_eq!(bisect_right(&t, -1.0), 0);
        assert_eq!(bisect_right(&t, 0.0), 1);
        assert_eq!(bisect_right(&t, 7.0), 2);
        assert_eq!(bisect_right(&t, 18.0), 4);
        assert_eq!(bisect_right(&[], 1.0), 0);
        assert_eq!(bisect_right(&[1.0, 1.0, 1.0], 1.0), 3);
    }

    #[test]
    fn test_nearest_time_index_boundaries() {
        let t = [0.0, 6.0, 12.0, 18.0];
        // exact match goes to the next step
        assert_eq!(nearest_time_index(&t, 6.0), Some((2, 12.0)));
        assert_eq!(nearest_time_index(&t, 7.0), Some((2, 12.0)));
        assert_eq!(nearest_time_index(&t, -100.0), Some((0, 0.0)));
        assert_eq!(nearest_time_index(&t, 18.0), Some((3, 18.0)));
        assert_eq!(nearest_time_index(&t, 1e9), Some((3, 18.0)));
        assert_eq!(nearest_time_index(&[], 1.0), None);
        assert_eq!(nearest_time_index(&[5.0], 5.0), Some((0, 5.0)));
    }

    fn two_clocks() -> MemoryDataset {
        let mut ds = MemoryDataset::new("two_clocks");
        ds.add_dimension("time", 3);
        ds.add_dimension("time_avg", 2);
        ds.add_dimension("node", 1);
        ds.add_variable(
            "time",
            &["time"],
            vec![0.0, 1.0, 2.0],
            &[
                ("standard_name", "time".into()),
                ("units", "hours since 2015-01-01".into()),
            ],
        )
        .unwrap();
        ds.add_variable(
            "time_avg",
            &["time_avg"],
            vec![0.0, 1.0],
            &[
                ("standard_name", "time".into()),
                ("units", "days since 2015-01-01".into()),
            ],
        )
        .unwrap();
        ds.add_variable("zeta", &["time", "node"], vec![0.0; 3], &[]).unwrap();
        ds.add_variable("zeta_avg", &["time_avg", "node"], vec![0.0; 2], &[])
            .unwrap();
        ds.add_variable(
            "wet",
            &["node"],
            vec![1.0],
            &[("coordinates", "lon lat time_avg".into())],
        )
        .unwrap();
        ds
    }

    #[test]
    fn test_time_variable_selection() {
        let ds = two_clocks();
        assert_eq!(time_variable(&ds, "zeta").unwrap().name, "time");
        assert_eq!(time_variable(&ds, "zeta_avg").unwrap().name, "time_avg");
        assert_eq!(time_variable(&ds, "wet").unwrap().name, "time_avg");
        assert!(matches!(
            time_variable(&ds, "missing"),
            Err(WmsError::LayerNotFound(_))
        ));
    }

    #[test]
    fn test_no_time_variable() {
        let mut ds = MemoryDataset::new("static");
        ds.add_dimension("node", 1);
        ds.add_variable("depth", &["node"], vec![5.0], &[]).unwrap();
        let when = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            nearest_time(&ds, "depth", &when),
            Err(WmsError::NoTimeVariable(_))
        ));
    }

    #[test]
    fn test_nearest_time_rounds_request() {
        let ds = two_clocks();
        // 00:40 rounds to hour 1, which bisects to the following step
        let when = Utc.with_ymd_and_hms(2015, 1, 1, 0, 40, 0).unwrap();
        assert_eq!(nearest_time(&ds, "zeta", &when).unwrap(), (2, 2.0));
        // 00:20 rounds to hour 0
        let when = Utc.with_ymd_and_hms(2015, 1, 1, 0, 20, 0).unwrap();
        assert_eq!(nearest_time(&ds, "zeta", &when).unwrap(), (1, 1.0));
    }

    #[test]
    fn test_decode_times_with_calendar() {
        let var = VariableInfo {
            name: "time".to_string(),
            dimensions: vec!["time".to_string()],
            shape: vec![2],
            attributes: [
                ("units".to_string(), AttrValue::from("days since 2001-02-27")),
                ("calendar".to_string(), AttrValue::from("noleap")),
            ]
            .into_iter()
            .collect(),
        };
        let times = decode_times(&var, &[0.0, 2.0, f64::NAN]).unwrap();
        assert_eq!(times.len(), 2);
        assert_eq!(times[1], Utc.with_ymd_and_hms(2001, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_decode_times_skips_fill_values() {
        let var = VariableInfo {
            name: "time".to_string(),
            dimensions: vec!["time".to_string()],
            shape: vec![4],
            attributes: [("units".to_string(), AttrValue::from("hours since 2015-01-01"))]
                .into_iter()
                .collect(),
        };
        // every other step masked
        let raw = test_utils::with_missing(test_utils::linear_axis(0.0, 6.0, 4), 2);
        let times = decode_times(&var, &raw).unwrap();
        assert_eq!(
            times,
            vec![
                Utc.with_ymd_and_hms(2015, 1, 1, 6, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2015, 1, 1, 18, 0, 0).unwrap(),
            ]
        );
    }
}
