//! Dictionary-encoded data views.
//!
//! [`DataMatrix`] is a dense row-major matrix of dictionary codes.
//! [`DataManager`] owns the encoded input table, per-column dictionaries,
//! attribute roles, the QI and sensitive submatrices the checker scans, and
//! the generalization hierarchies. Input parsing happens here once; the
//! search path only ever touches dense `u32` codes.

use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::hierarchy::GeneralizationHierarchy;

/// Role of an attribute in the anonymization problem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeRole {
    /// Participates in the generalization lattice.
    QuasiIdentifying,
    /// Carried through; drives l-diversity / t-closeness distributions.
    Sensitive,
    /// Carried through untouched.
    Insensitive,
    /// Dropped from output (rendered as the suppression marker).
    Identifying,
}

/// Declaration of one input column.
#[derive(Clone, Debug)]
pub struct AttributeSpec {
    pub name: String,
    pub role: AttributeRole,
    /// Label matrix `[leaf][level]`; required for QI attributes, optional for
    /// sensitive ones (enables hierarchical t-closeness).
    pub hierarchy: Option<Vec<Vec<String>>>,
}

impl AttributeSpec {
    /// A quasi-identifying attribute with its generalization hierarchy.
    pub fn quasi_identifying(name: impl Into<String>, hierarchy: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            role: AttributeRole::QuasiIdentifying,
            hierarchy: Some(hierarchy),
        }
    }

    /// A sensitive attribute without a hierarchy.
    pub fn sensitive(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: AttributeRole::Sensitive,
            hierarchy: None,
        }
    }

    /// A sensitive attribute with a hierarchy (for hierarchical t-closeness).
    pub fn sensitive_with_hierarchy(name: impl Into<String>, hierarchy: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            role: AttributeRole::Sensitive,
            hierarchy: Some(hierarchy),
        }
    }

    /// An insensitive attribute.
    pub fn insensitive(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: AttributeRole::Insensitive,
            hierarchy: None,
        }
    }

    /// A directly identifying attribute.
    pub fn identifying(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: AttributeRole::Identifying,
            hierarchy: None,
        }
    }
}

/// Dense row-major matrix of dictionary codes.
#[derive(Clone, Debug)]
pub struct DataMatrix {
    cells: Vec<u32>,
    rows: usize,
    cols: usize,
}

impl DataMatrix {
    /// Create a zero-filled matrix.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            cells: vec![0; rows * cols],
            rows,
            cols,
        }
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Code at (row, col).
    #[inline]
    pub fn value(&self, row: usize, col: usize) -> u32 {
        self.cells[row * self.cols + col]
    }

    /// Set the code at (row, col).
    #[inline]
    pub fn set_value(&mut self, row: usize, col: usize, code: u32) {
        self.cells[row * self.cols + col] = code;
    }

    /// One row as a slice.
    #[inline]
    pub fn row(&self, row: usize) -> &[u32] {
        &self.cells[row * self.cols..(row + 1) * self.cols]
    }
}

/// Owner of the encoded input and everything derived from it.
#[derive(Clone, Debug)]
pub struct DataManager {
    header: Vec<String>,
    roles: Vec<AttributeRole>,
    dictionaries: Vec<Dictionary>,
    table: DataMatrix,
    qi_indices: Vec<usize>,
    sensitive_indices: Vec<usize>,
    data_qi: DataMatrix,
    data_se: DataMatrix,
    hierarchies: Vec<GeneralizationHierarchy>,
    sensitive_hierarchies: Vec<Option<GeneralizationHierarchy>>,
    population: Option<Vec<u32>>,
}

impl DataManager {
    /// Encode an input table.
    ///
    /// Every value of a column with a hierarchy must appear as a leaf of that
    /// hierarchy. `population`, when given, holds one multiplicity per row
    /// (the number of population records the row stands for) and feeds the
    /// journalist attacker model; `None` leaves population counts at zero.
    pub fn from_rows(
        attributes: Vec<AttributeSpec>,
        rows: &[Vec<String>],
        population: Option<Vec<u32>>,
    ) -> Result<Self> {
        let cols = attributes.len();
        if cols == 0 {
            return Err(Error::data("no attributes defined"));
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(Error::data(format!(
                    "row {i} has {} values, expected {cols}",
                    row.len()
                )));
            }
        }
        if let Some(pop) = &population {
            if pop.len() != rows.len() {
                return Err(Error::data(format!(
                    "population column has {} entries for {} rows",
                    pop.len(),
                    rows.len()
                )));
            }
        }

        let header: Vec<String> = attributes.iter().map(|a| a.name.clone()).collect();
        let roles: Vec<AttributeRole> = attributes.iter().map(|a| a.role).collect();

        // Encode hierarchies first so leaf codes are dense from 0, then the
        // table cells against the same dictionaries.
        let mut dictionaries: Vec<Dictionary> = (0..cols).map(|_| Dictionary::new()).collect();
        let mut encoded_hierarchies: Vec<Option<GeneralizationHierarchy>> = Vec::with_capacity(cols);
        for (col, attribute) in attributes.iter().enumerate() {
            match &attribute.hierarchy {
                Some(labels) => {
                    let hierarchy =
                        encode_hierarchy(&attribute.name, labels, &mut dictionaries[col])?;
                    encoded_hierarchies.push(Some(hierarchy));
                }
                None => encoded_hierarchies.push(None),
            }
        }

        let mut table = DataMatrix::new(rows.len(), cols);
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let code = match &encoded_hierarchies[c] {
                    Some(hierarchy) => {
                        let code = dictionaries[c].lookup(value).ok_or_else(|| {
                            Error::data(format!(
                                "value '{value}' in column '{}' is not a leaf of its hierarchy",
                                header[c]
                            ))
                        })?;
                        if (code as usize) >= hierarchy.num_leaves() {
                            return Err(Error::data(format!(
                                "value '{value}' in column '{}' is a generalized label, not a leaf",
                                header[c]
                            )));
                        }
                        code
                    }
                    None => dictionaries[c].intern(value),
                };
                table.set_value(r, c, code);
            }
        }

        let qi_indices: Vec<usize> = roles
            .iter()
            .enumerate()
            .filter(|(_, role)| **role == AttributeRole::QuasiIdentifying)
            .map(|(i, _)| i)
            .collect();
        let sensitive_indices: Vec<usize> = roles
            .iter()
            .enumerate()
            .filter(|(_, role)| **role == AttributeRole::Sensitive)
            .map(|(i, _)| i)
            .collect();

        for &col in &qi_indices {
            if encoded_hierarchies[col].is_none() {
                return Err(Error::data(format!(
                    "quasi-identifying attribute '{}' has no hierarchy",
                    header[col]
                )));
            }
        }

        let data_qi = project(&table, &qi_indices);
        let data_se = project(&table, &sensitive_indices);
        let hierarchies: Vec<GeneralizationHierarchy> = qi_indices
            .iter()
            .map(|&col| encoded_hierarchies[col].clone().expect("validated above"))
            .collect();
        let sensitive_hierarchies: Vec<Option<GeneralizationHierarchy>> = sensitive_indices
            .iter()
            .map(|&col| encoded_hierarchies[col].clone())
            .collect();

        Ok(Self {
            header,
            roles,
            dictionaries,
            table,
            qi_indices,
            sensitive_indices,
            data_qi,
            data_se,
            hierarchies,
            sensitive_hierarchies,
            population,
        })
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.table.rows()
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.table.cols()
    }

    /// Column names.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Role of a column.
    pub fn role(&self, col: usize) -> AttributeRole {
        self.roles[col]
    }

    /// Column indices of the quasi-identifying attributes, in QI order.
    pub fn qi_indices(&self) -> &[usize] {
        &self.qi_indices
    }

    /// Column indices of the sensitive attributes, in sensitive order.
    pub fn sensitive_indices(&self) -> &[usize] {
        &self.sensitive_indices
    }

    /// The QI submatrix (`rows x |QI|`).
    pub fn data_qi(&self) -> &DataMatrix {
        &self.data_qi
    }

    /// The sensitive submatrix (`rows x |sensitive|`).
    pub fn data_se(&self) -> &DataMatrix {
        &self.data_se
    }

    /// Generalization hierarchies, one per QI attribute.
    pub fn hierarchies(&self) -> &[GeneralizationHierarchy] {
        &self.hierarchies
    }

    /// Hierarchies of sensitive attributes, where declared.
    pub fn sensitive_hierarchies(&self) -> &[Option<GeneralizationHierarchy>] {
        &self.sensitive_hierarchies
    }

    /// Population multiplicity of a row; 0 without a population column.
    pub fn population_of(&self, row: usize) -> u32 {
        self.population.as_ref().map_or(0, |pop| pop[row])
    }

    /// Dictionary of a column.
    pub fn dictionary(&self, col: usize) -> &Dictionary {
        &self.dictionaries[col]
    }

    /// Code at (row, col) of the full table.
    pub fn value(&self, row: usize, col: usize) -> u32 {
        self.table.value(row, col)
    }

    /// Label at (row, col) of the full table.
    pub fn value_str(&self, row: usize, col: usize) -> &str {
        self.dictionaries[col]
            .value(self.table.value(row, col))
            .expect("table codes are interned")
    }
}

fn project(table: &DataMatrix, columns: &[usize]) -> DataMatrix {
    let mut out = DataMatrix::new(table.rows(), columns.len());
    for row in 0..table.rows() {
        for (i, &col) in columns.iter().enumerate() {
            out.set_value(row, i, table.value(row, col));
        }
    }
    out
}

/// Encode a label matrix against the attribute dictionary: leaves (column 0)
/// first in row order, generalized labels afterwards.
fn encode_hierarchy(
    name: &str,
    labels: &[Vec<String>],
    dictionary: &mut Dictionary,
) -> Result<GeneralizationHierarchy> {
    if labels.is_empty() {
        return Err(Error::hierarchy(format!("hierarchy '{name}' has no rows")));
    }
    for row in labels {
        if row.is_empty() {
            return Err(Error::hierarchy(format!("hierarchy '{name}' has height 0")));
        }
        dictionary.intern(&row[0]);
    }
    let num_leaves = labels.len();
    if dictionary.len() != num_leaves {
        return Err(Error::hierarchy(format!(
            "hierarchy '{name}' repeats a leaf value"
        )));
    }
    let mut matrix = Vec::with_capacity(num_leaves);
    for row in labels {
        let codes: Vec<u32> = row.iter().map(|label| dictionary.intern(label)).collect();
        matrix.push(codes);
    }
    GeneralizationHierarchy::new(name, matrix)
}
