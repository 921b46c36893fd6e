use std::error::Error;

use itertools::Itertools;
use plotters::{
    coord::Shift,
    prelude::*,
    style::text_anchor::{HPos, Pos, VPos},
};
use tracing::info;

use super::DrawFn;
use crate::analysis::{results::CYCLES_COLUMN, ResultTable};

/// grouped bars: one group per value of the first axis, one bar per remaining labels
#[derive(Debug, Default, PartialEq, Eq)]
struct Bars {
    groups: Vec<String>,
    series: Vec<String>,
    /// (group, series, cycles)
    values: Vec<(usize, usize, u64)>,
}

fn index_of(names: &mut Vec<String>, name: String) -> usize {
    match names.iter().position(|n| *n == name) {
        Some(index) => index,
        None => {
            names.push(name);
            names.len() - 1
        }
    }
}

fn collect_bars(table: &ResultTable) -> Bars {
    let mut bars = Bars::default();
    for (key, result) in table.rows() {
        let Some(cycles) = result.cycles() else {
            continue;
        };
        let mut labels = key.labels();
        let group = labels.next().unwrap_or_default().to_string();
        let series = labels.join(", ");
        let group = index_of(&mut bars.groups, group);
        let series = index_of(&mut bars.series, series);
        bars.values.push((group, series, cycles));
    }
    bars
}

pub struct CyclesDrawer;

impl DrawFn for CyclesDrawer {
    type DATA = ResultTable;

    fn draw_apply<'a, DB: DrawingBackend + 'a>(
        root: DrawingArea<DB, Shift>,
        data: &Self::DATA,
    ) -> Result<(), Box<dyn Error + 'a>> {
        let bars = collect_bars(data);
        let (Some(low), Some(high)) = (
            bars.values.iter().map(|v| v.2).min(),
            bars.values.iter().map(|v| v.2).max(),
        ) else {
            return Err("no run with a cycle count to draw".into());
        };
        info!(
            "draw {} bars in {} groups",
            bars.values.len(),
            bars.groups.len()
        );
        let low = (low as f64 / 2.).max(1.);
        let high = high as f64 * 2.;
        let x_desc = data
            .axes()
            .first()
            .map(|axis| axis.to_string())
            .unwrap_or_default();

        let mut chart = ChartBuilder::on(&root)
            .caption(CYCLES_COLUMN, ("sans-serif", 40).into_font())
            .margin(20)
            .x_label_area_size(80)
            .y_label_area_size(100)
            .build_cartesian_2d(0f64..bars.groups.len() as f64, (low..high).log_scale())?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_label_formatter(&|_: &f64| String::new())
            .x_desc(x_desc)
            .y_desc(CYCLES_COLUMN)
            .draw()?;

        let width = 0.8 / bars.series.len() as f64;
        for (series, name) in bars.series.iter().enumerate() {
            let color = Palette99::pick(series);
            let drawn = chart.draw_series(
                bars.values
                    .iter()
                    .filter(|(_, s, _)| *s == series)
                    .map(|&(group, _, cycles)| {
                        let x = group as f64 + 0.1 + series as f64 * width;
                        Rectangle::new(
                            [(x, low), (x + width * 0.9, cycles as f64)],
                            color.filled(),
                        )
                    }),
            )?;
            if !name.is_empty() {
                drawn.label(name).legend(move |(x, y)| {
                    Rectangle::new([(x, y - 5), (x + 10, y + 5)], Palette99::pick(series).filled())
                });
            }
        }
        if bars.series.iter().any(|name| !name.is_empty()) {
            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
        }

        let style = TextStyle::from(("sans-serif", 20).into_font())
            .pos(Pos::new(HPos::Center, VPos::Top));
        for (index, group) in bars.groups.iter().enumerate() {
            let (x, y) = chart.backend_coord(&(index as f64 + 0.5, low));
            root.draw(&Text::new(group.clone(), (x, y + 8), style.clone()))?;
        }
        root.present()?;
        Ok(())
    }
}
