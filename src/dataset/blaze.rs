// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helper functions to handle captures of the Blaze ToF + IR + RGB rig.

use std::fmt;
use std::io::Write;

use crate::core::error::{Error, Result};
use crate::core::homography::{self, Coefficients};
use crate::core::projection::{CellMapping, SensorFrame};
use crate::misc::type_aliases::{DepthMap, Float};

/// Resolution of the Blaze depth sensor.
pub const DEPTH_FRAME: SensorFrame = SensorFrame {
    width: 640,
    height: 480,
};

/// Resolution of the IR camera.
pub const IR_FRAME: SensorFrame = SensorFrame {
    width: 320,
    height: 240,
};

/// Resolution of the RGB camera.
pub const RGB_FRAME: SensorFrame = SensorFrame {
    width: 1024,
    height: 760,
};

/// IR pixels at or below this intensity are not warped.
pub const IR_THRESHOLD: u8 = 50;

/// Header of the depth tables.
pub const DEPTH_TABLE_HEADER: &str = "row col z";

/// Header of the pixel mapping table.
pub const MAPPING_TABLE_HEADER: &str = "row col depth_mm IR_x IR_y RGB_x RGB_y";

/// Fitted coefficients of the IR homography, with depth in cm.
#[allow(clippy::unreadable_literal)]
pub fn ir_coefficients() -> Coefficients {
    Coefficients::from_pairs([
        [(1.07204, -0.00005), (-0.10841, -0.00062), (157.342, 0.084)],
        [(0.02877, 0.00004), (0.96821, -0.00071), (51.135, 0.227)],
        [(0.00008, 0.0000003), (-0.00041, -0.0000017), (1.0, 0.0)],
    ])
}

/// Fitted coefficients of the RGB homography, with depth in cm.
#[allow(clippy::unreadable_literal)]
pub fn rgb_coefficients() -> Coefficients {
    Coefficients::from_pairs([
        [(0.26969, 0.00031), (0.00174, -0.00031), (172.811, 0.025)],
        [(-0.03179, 0.00021), (0.31907, -0.00017), (110.336, 0.167)],
        [(-0.00016, 0.0000009), (0.000014, -0.0000009), (1.0, 0.0)],
    ])
}

/// Line of the pixel mapping table.
impl fmt::Display for CellMapping {
    /// `row col depth_mm IR_x IR_y RGB_x RGB_y`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {:.2} {} {} {} {}",
            self.row, self.col, self.z, self.ir.0, self.ir.1, self.rgb.0, self.rgb.1
        )
    }
}

/// Write a depth grid as a `row col z` table, row-major, 1-based.
/// Missing cells are omitted.
pub fn write_depth_table<W: Write>(writer: &mut W, grid: &DepthMap) -> Result<()> {
    writeln!(writer, "{}", DEPTH_TABLE_HEADER)?;
    for r in 0..grid.nrows() {
        for c in 0..grid.ncols() {
            let z = grid[(r, c)];
            if !z.is_nan() {
                writeln!(writer, "{} {} {:.6}", r + 1, c + 1, z)?;
            }
        }
    }
    Ok(())
}

/// Write the pixel mapping table.
pub fn write_mapping_table<W: Write>(writer: &mut W, cells: &[CellMapping]) -> Result<()> {
    writeln!(writer, "{}", MAPPING_TABLE_HEADER)?;
    for cell in cells {
        writeln!(writer, "{}", cell)?;
    }
    Ok(())
}

/// Write coefficients in the format of the linear fitting tool,
/// with an optional `### title ###` line.
pub fn write_coefficients<W: Write>(
    writer: &mut W,
    coefficients: &Coefficients,
    title: Option<&str>,
) -> Result<()> {
    if let Some(title) = title {
        writeln!(writer, "### {} ###", title)?;
    }
    for (i, row) in coefficients.entries.iter().enumerate() {
        for (j, entry) in row.iter().enumerate() {
            writeln!(
                writer,
                "{}(d) = {:.10} + {:.10} * d",
                homography::label(i, j),
                entry.offset,
                entry.slope
            )?;
        }
    }
    Ok(())
}

/// Depth grid of size `nrows x ncols` from `(row, col, z)` table entries.
/// Cells absent from the table are missing.
pub fn grid_from_table(
    entries: &[(usize, usize, Float)],
    nrows: usize,
    ncols: usize,
) -> Result<DepthMap> {
    let mut grid = DepthMap::from_element(nrows, ncols, Float::NAN);
    for &(row, col, z) in entries {
        if row == 0 || col == 0 || row > nrows || col > ncols {
            return Err(Error::Dimension {
                expected: format!("row in 1..={} and col in 1..={}", nrows, ncols),
                found: format!("row {} col {}", row, col),
            });
        }
        grid[(row - 1, col - 1)] = z;
    }
    Ok(grid)
}

/// Parse text files produced around the rig (coefficients, depth tables).
pub mod parse {
    use super::*;
    use nom::{
        branch::alt,
        bytes::complete::tag,
        character::complete::{char, digit1, one_of, space0, space1},
        combinator::{all_consuming, map, map_res, rest, value},
        number::complete::double,
        sequence::{preceded, terminated, tuple},
        IResult,
    };

    /// Parse the output of the linear fitting tool into coefficients.
    ///
    /// All nine entries are required, each exactly once.
    pub fn coefficients(file_content: &str) -> Result<Coefficients> {
        let mut found: [[Option<(Float, Float)>; 3]; 3] = [[None; 3]; 3];
        for (line, ((i, j), pair)) in multi_line(coefficient_line, file_content)? {
            if found[i][j].replace(pair).is_some() {
                return Err(Error::Parse {
                    line,
                    reason: format!("duplicate coefficient {}", homography::label(i, j)),
                });
            }
        }
        let mut pairs = [[(0.0, 0.0); 3]; 3];
        for (i, row) in found.iter().enumerate() {
            for (j, pair) in row.iter().enumerate() {
                pairs[i][j] = pair.ok_or_else(|| Error::Parse {
                    line: file_content.lines().count(),
                    reason: format!("missing coefficient {}", homography::label(i, j)),
                })?;
            }
        }
        Ok(Coefficients::from_pairs(pairs))
    }

    /// Parse a `row col z` depth table into its entries.
    pub fn depth_table(file_content: &str) -> Result<Vec<(usize, usize, Float)>> {
        Ok(multi_line(depth_line, file_content)?
            .into_iter()
            .map(|(_, entry)| entry)
            .collect())
    }

    /// Apply a line parser to every non blank line,
    /// keeping the 1-based line number of each parsed item.
    fn multi_line<F, T>(line_parser: F, file_content: &str) -> Result<Vec<(usize, T)>>
    where
        F: Fn(&str) -> IResult<&str, Option<T>>,
    {
        let mut vec_data = Vec::new();
        for (idx, line) in file_content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match all_consuming(terminated(&line_parser, space0))(line.trim_start()) {
                Ok((_, Some(data))) => vec_data.push((idx + 1, data)),
                Ok(_) => (),
                Err(err) => {
                    return Err(Error::Parse {
                        line: idx + 1,
                        reason: format!("{:?}", err),
                    })
                }
            }
        }
        Ok(vec_data)
    }

    // nom parsers #############################################################

    // Coefficients --------------------

    // Coefficient line is either a comment or `Hij(d) = a + b * d`.
    fn coefficient_line(input: &str) -> IResult<&str, Option<((usize, usize), (Float, Float))>> {
        alt((value(None, comment), map(coefficient, Some)))(input)
    }

    fn coefficient(input: &str) -> IResult<&str, ((usize, usize), (Float, Float))> {
        map(
            tuple((
                preceded(char('H'), entry_index),
                entry_index,
                preceded(tuple((tag("(d)"), space0, char('='), space0)), double),
                preceded(tuple((space0, char('+'), space0)), double),
                preceded(tuple((space0, char('*'), space0)), char('d')),
            )),
            |(i, j, a, b, _)| ((i, j), (a, b)),
        )(input)
    }

    // 1-based matrix index, converted to 0-based.
    fn entry_index(input: &str) -> IResult<&str, usize> {
        map(one_of("123"), |c| c as usize - '1' as usize)(input)
    }

    // Parse a comment.
    fn comment(input: &str) -> IResult<&str, ()> {
        value((), preceded(char('#'), rest))(input)
    }

    // Depth table ---------------------

    // Depth line is either the header, a comment, or `row col z`.
    fn depth_line(input: &str) -> IResult<&str, Option<(usize, usize, Float)>> {
        alt((
            value(None, tag(DEPTH_TABLE_HEADER)),
            value(None, comment),
            map(depth_entry, Some),
        ))(input)
    }

    fn depth_entry(input: &str) -> IResult<&str, (usize, usize, Float)> {
        tuple((index, preceded(space1, index), preceded(space1, double)))(input)
    }

    fn index(input: &str) -> IResult<&str, usize> {
        map_res(digit1, |s: &str| s.parse::<usize>())(input)
    }
} // pub mod parse

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use crate::core::projection::SensorModel;
    use approx::assert_relative_eq;

    const FIT_OUTPUT: &str = "### IR to Blaze Homography Coefficients ###
H11(d) = 1.0720400000 + -0.0000500000 * d
H12(d) = -0.1084100000 + -0.0006200000 * d
H13(d) = 157.3420000000 + 0.0840000000 * d
H21(d) = 0.0287700000 + 0.0000400000 * d
H22(d) = 0.9682100000 + -0.0007100000 * d
H23(d) = 51.1350000000 + 0.2270000000 * d
H31(d) = 0.0000800000 + 0.0000003000 * d
H32(d) = -0.0004100000 + -0.0000017000 * d
H33(d) = 1.0000000000 + 0.0000000000 * d
";

    #[test]
    fn parse_fitting_tool_output() {
        let coefs = parse::coefficients(FIT_OUTPUT).unwrap();
        let expected = ir_coefficients();
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(coefs.entries[i][j].offset, expected.entries[i][j].offset);
                assert_relative_eq!(coefs.entries[i][j].slope, expected.entries[i][j].slope);
            }
        }
    }

    #[test]
    fn written_coefficients_parse_back() {
        let mut bytes = Vec::new();
        write_coefficients(&mut bytes, &rgb_coefficients(), Some("RGB to Blaze")).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("### RGB to Blaze ###\nH11(d) = 0.2696900000 + 0.0003100000 * d\n"));
        let coefs = parse::coefficients(&text).unwrap();
        assert_relative_eq!(coefs.entries[2][1].slope, -0.0000009);
        assert_relative_eq!(coefs.entries[0][2].offset, 172.811);
    }

    #[test]
    fn missing_coefficient() {
        let text: String = FIT_OUTPUT.lines().take(9).collect::<Vec<_>>().join("\n");
        match parse::coefficients(&text) {
            Err(Error::Parse { reason, .. }) => assert!(reason.contains("H33")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn duplicate_coefficient() {
        let text = format!("{}H12(d) = 0.0 + 0.0 * d\n", FIT_OUTPUT);
        match parse::coefficients(&text) {
            Err(Error::Parse { line, reason }) => {
                assert_eq!(line, 11);
                assert!(reason.contains("H12"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn out_of_range_label() {
        let text = FIT_OUTPUT.replace("H32", "H42");
        assert!(matches!(
            parse::coefficients(&text),
            Err(Error::Parse { line: 9, .. })
        ));
    }

    #[test]
    fn depth_table_round_trip() {
        let mut grid = DepthMap::from_element(2, 3, Float::NAN);
        grid[(0, 0)] = -812.25;
        grid[(0, 2)] = 0.0;
        grid[(1, 1)] = -1003.5;
        let mut bytes = Vec::new();
        write_depth_table(&mut bytes, &grid).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            "row col z\n1 1 -812.250000\n1 3 0.000000\n2 2 -1003.500000\n"
        );
        let entries = parse::depth_table(&text).unwrap();
        assert_eq!(entries.len(), 3);
        let back = grid_from_table(&entries, 2, 3).unwrap();
        assert_eq!(back[(1, 1)], -1003.5);
        assert!(back[(1, 0)].is_nan());
    }

    #[test]
    fn depth_table_errors() {
        assert!(matches!(
            parse::depth_table("row col z\n1 1 3.0\n2 x 1.0\n"),
            Err(Error::Parse { line: 3, .. })
        ));
        assert!(matches!(
            grid_from_table(&[(3, 1, 1.0)], 2, 2),
            Err(Error::Dimension { .. })
        ));
    }

    #[test]
    fn mapping_table_lines() {
        let cells = [CellMapping {
            row: 12,
            col: 40,
            z: -1234.567,
            ir: (3, 4),
            rgb: (500, 600),
        }];
        let mut bytes = Vec::new();
        write_mapping_table(&mut bytes, &cells).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "row col depth_mm IR_x IR_y RGB_x RGB_y\n12 40 -1234.57 3 4 500 600\n"
        );
    }

    #[test]
    fn rig_center_lands_inside_both_sensors() {
        let (ir_coefs, rgb_coefs) = (ir_coefficients(), rgb_coefficients());
        let ir = SensorModel {
            frame: IR_FRAME,
            coefficients: &ir_coefs,
        };
        let rgb = SensorModel {
            frame: RGB_FRAME,
            coefficients: &rgb_coefs,
        };
        let (row, col) = (DEPTH_FRAME.height / 2, DEPTH_FRAME.width / 2);
        let h_ir = ir_coefs.inverse_at_depth(100.0).unwrap();
        let h_rgb = rgb_coefs.inverse_at_depth(100.0).unwrap();
        let ir_xy = crate::core::projection::apply(&h_ir, col as Float, row as Float).unwrap();
        let rgb_xy = crate::core::projection::apply(&h_rgb, col as Float, row as Float).unwrap();
        assert!(ir_xy.0 > 0.0 && ir_xy.0 < ir.frame.width as Float);
        assert!(ir_xy.1 > 0.0 && ir_xy.1 < ir.frame.height as Float);
        assert!(rgb_xy.0 > 0.0 && rgb_xy.0 < rgb.frame.width as Float);
        assert!(rgb_xy.1 > 0.0 && rgb_xy.1 < rgb.frame.height as Float);
    }
}
