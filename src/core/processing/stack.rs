//! Assemble single-channel planes into the 3-channel layout the model expects.
use ndarray::{Array2, Array3, Axis, stack};

use crate::error::{Error, Result};
use crate::types::ChannelAssignment;

fn stack_rgb(red: &Array2<f32>, green: &Array2<f32>, blue: &Array2<f32>) -> Result<Array3<f32>> {
    stack(Axis(2), &[red.view(), green.view(), blue.view()])
        .map_err(|e| Error::InvalidShape(format!("cannot stack channels: {}", e)))
}

/// Cytoplasm in red, nucleus in blue, green left empty.
pub fn stack_cells(
    cytoplasm: &Array2<f32>,
    nucleus: &Array2<f32>,
) -> Result<(Array3<f32>, ChannelAssignment)> {
    if cytoplasm.dim() != nucleus.dim() {
        return Err(Error::InvalidShape(format!(
            "cytoplasm image is {:?} but nucleus image is {:?}",
            cytoplasm.dim(),
            nucleus.dim()
        )));
    }
    let zeros = Array2::<f32>::zeros(cytoplasm.dim());
    Ok((stack_rgb(cytoplasm, &zeros, nucleus)?, ChannelAssignment::CELLS))
}

/// Single signal in blue, red and green left empty.
pub fn stack_nuclei(nucleus: &Array2<f32>) -> Result<(Array3<f32>, ChannelAssignment)> {
    let zeros = Array2::<f32>::zeros(nucleus.dim());
    Ok((stack_rgb(&zeros, &zeros, nucleus)?, ChannelAssignment::NUCLEI))
}
