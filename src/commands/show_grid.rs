use anyhow::Result;

use crate::config::SweepConfig;
use crate::grid::GridCell;

pub fn show_grid(config: &SweepConfig, format: &str) -> Result<()> {
    let cells: Vec<GridCell> = config.grid().cells().collect();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&cells)?),
        "csv" => print!("{}", render_csv(&cells)),
        _ => output_table(config, &cells),
    }

    Ok(())
}

fn render_csv(cells: &[GridCell]) -> String {
    let mut out = String::from("index,rate,angle\n");
    for cell in cells {
        out.push_str(&format!("{},{},{}\n", cell.index, cell.rate, cell.angle));
    }
    out
}

fn output_table(config: &SweepConfig, cells: &[GridCell]) {
    println!("{:<8} {:>10} {:>10}", "Cell", "Rate", "Angle");
    println!("{:-<30}", "");

    for cell in cells {
        println!("{:<8} {:>10} {:>10}", cell.index, cell.rate, cell.angle);
    }

    println!(
        "\nTotal: {} cells ({} rates x {} angles), rerun {}",
        cells.len(),
        config.rates.count(),
        config.angles.count(),
        config.rerun_spec()
    );
}
