use std::{error::Error, path::Path};

use eyre::{bail, eyre};
use plotters::{coord::Shift, prelude::*};
use tracing::info;

mod cycles;
pub use cycles::CyclesDrawer;

pub const DEFAULT_SIZE: (u32, u32) = (1920, 1080);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ext {
    Png,
    Svg,
}

pub trait DrawFn {
    type DATA: ?Sized;
    fn draw_apply<'a, DB: DrawingBackend + 'a>(
        root: DrawingArea<DB, Shift>,
        data: &Self::DATA,
    ) -> Result<(), Box<dyn Error + 'a>>;
}

pub fn get_ext(output_path: &Path) -> eyre::Result<Ext> {
    match output_path.extension().and_then(|ext| ext.to_str()) {
        Some("png") => Ok(Ext::Png),
        Some("svg") => Ok(Ext::Svg),
        _ => bail!("cannot draw into {output_path:?}, use a .png or .svg file"),
    }
}

/// the generic fn to draw the data using the DrawFn
pub fn draw_data<DATA: ?Sized, F: DrawFn<DATA = DATA>>(
    output_path: &Path,
    data: &DATA,
) -> eyre::Result<()> {
    draw_data_with_size::<DATA, F>(output_path, data, DEFAULT_SIZE)
}

pub fn draw_data_with_size<DATA: ?Sized, F: DrawFn<DATA = DATA>>(
    output_path: &Path,
    data: &DATA,
    size: (u32, u32),
) -> eyre::Result<()> {
    let ext = get_ext(output_path)?;
    if let Some(dir) = output_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    info!("draw data into {:?}", output_path);
    match ext {
        Ext::Svg => {
            let root = SVGBackend::new(output_path, size).into_drawing_area();
            root.fill(&WHITE).map_err(|e| eyre!("{e}"))?;
            F::draw_apply(root, data).map_err(|e| eyre!("cannot draw {output_path:?}: {e}"))?;
        }
        Ext::Png => {
            let root = BitMapBackend::new(output_path, size).into_drawing_area();
            root.fill(&WHITE).map_err(|e| eyre!("{e}"))?;
            F::draw_apply(root, data).map_err(|e| eyre!("cannot draw {output_path:?}: {e}"))?;
        }
    };
    Ok(())
}
