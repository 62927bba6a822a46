// src/main.rs
use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;

use rsense_calc::batch::{
    self, AreaOperation, IndexOperation, KappaOperation, Operation, OperationReport, RunContext, SelectionOperation,
    TextureOperation,
};
use rsense_calc::cli::{Cli, Commands, IndexKind, RasterIndexArgs};
use rsense_calc::processing::signatures::{vegetation_transition, IndexSummary, Surface};
use rsense_calc::processing::texture::TextureFeatures;

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    let global = batch::GlobalParams {
        float: cli.float,
        scale_factor: cli.scale_factor,
        ..Default::default()
    };
    let ctx = RunContext::new(global);

    match &cli.command {
        Commands::Index {
            kind,
            nir,
            red,
            blue,
            constants,
        } => {
            let index = kind.with_constants(constants);
            let mut bands = vec![*nir, *red];
            if *kind == IndexKind::Evi {
                bands.push(blue.context("EVI needs --blue")?);
            }
            let value = index.compute_scalar(&bands)?;
            if cli.json {
                print_json(&serde_json::json!({ "index": index.name(), "value": value }))?;
            } else {
                println!("{}: {:.4}", index.name(), value);
            }
        }
        Commands::Signature { transition } => print_signatures(*transition, cli.json)?,
        Commands::Ndvi(args) => run(&cli, &ctx, Operation::Ndvi(index_operation(&cli, args)))?,
        Commands::Evi(args) => run(&cli, &ctx, Operation::Evi(index_operation(&cli, args)))?,
        Commands::Savi(args) => run(&cli, &ctx, Operation::Savi(index_operation(&cli, args)))?,
        Commands::Texture {
            image_a,
            image_b,
            distances,
            angles,
            levels,
        } => {
            let op = TextureOperation {
                image_a: image_a.clone(),
                image_b: image_b.clone(),
                distances: Some(distances.clone()),
                angles: Some(angles.clone()),
                levels: Some(*levels),
                output: cli.output.clone(),
            };
            run(&cli, &ctx, Operation::Texture(op))?;
        }
        Commands::Kappa { truth, prediction } => {
            let op = KappaOperation {
                truth: truth.clone(),
                prediction: prediction.clone(),
                output: cli.output.clone(),
            };
            run(&cli, &ctx, Operation::Kappa(op))?;
        }
        Commands::Areas {
            raster,
            classes,
            pixel_size,
        } => {
            let pixel_size = match pixel_size.as_deref() {
                Some(&[x, y]) => Some((x, y)),
                Some(other) => bail!("--pixel-size takes two values, got {}", other.len()),
                None => None,
            };
            let op = AreaOperation {
                raster: raster.clone(),
                classes: classes.clone(),
                pixel_size,
                output: cli.output.clone(),
            };
            run(&cli, &ctx, Operation::ClassAreas(op))?;
        }
        Commands::Select { table, target, k } => {
            let op = SelectionOperation {
                table: table.clone(),
                target: target.clone(),
                k: *k,
                output: cli.output.clone(),
            };
            run(&cli, &ctx, Operation::SelectFeatures(op))?;
        }
        Commands::Batch { config } => {
            let reports = batch::process_batch(config)?;
            if cli.json {
                print_json(&reports)?;
            } else {
                for report in &reports {
                    print_report(report);
                }
            }
        }
    }

    Ok(())
}

fn index_operation(cli: &Cli, args: &RasterIndexArgs) -> IndexOperation {
    IndexOperation {
        nir: args.nir.clone(),
        red: args.red.clone(),
        blue: args.blue.clone(),
        image: args.image.clone(),
        channels: Some(vec![args.nir_channel, args.red_channel, args.blue_channel]),
        params: args.constants.clone(),
        output: cli.output.clone(),
        float: Some(cli.float),
        scale_factor: Some(cli.scale_factor),
    }
}

fn run(cli: &Cli, ctx: &RunContext, mut op: Operation) -> Result<()> {
    // Channel numbers from the command line always list blue; trim to the index
    if let Operation::Ndvi(index) | Operation::Savi(index) = &mut op {
        if let Some(channels) = &mut index.channels {
            channels.truncate(2);
        }
    }
    let report = op.execute(ctx)?;
    if cli.json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_report(report: &OperationReport) {
    match report {
        OperationReport::Index(r) => {
            println!("{} over {}x{} pixels", r.index, r.rows, r.cols);
            match (r.mean, r.min, r.max) {
                (Some(mean), Some(min), Some(max)) => {
                    println!("  mean {:.4}  min {:.4}  max {:.4}", mean, min, max)
                }
                _ => println!("  every pixel masked"),
            }
            println!("  masked (zero denominator): {}", r.masked_pixels);
            if let Some(path) = &r.output {
                println!("  written to {}", path.display());
            }
        }
        OperationReport::Texture(c) => {
            println!("{:<12} {:>12} {:>12} {:>12}", "Feature", "Image A", "Image B", "Difference");
            let (a, b, d) = (c.first.as_array(), c.second.as_array(), c.differences.as_array());
            for (i, name) in TextureFeatures::NAMES.iter().enumerate() {
                println!("{:<12} {:>12.4} {:>12.4} {:>12.4}", name, a[i], b[i], d[i]);
            }
            println!("Euclidean distance: {:.4}", c.distance);
        }
        OperationReport::Kappa(k) => {
            println!("Cohen's Kappa:      {:.4}", k.agreement.kappa);
            println!("Observed agreement: {:.2}%", k.agreement.observed_agreement * 100.0);
            println!("Interpretation:     {}", k.interpretation);
        }
        OperationReport::ClassAreas(r) => {
            println!("{:>8}  {:<24} {:>10} {:>14} {:>12} {:>8}", "ID", "Class", "Pixels", "Area (m2)", "Area (ha)", "%");
            for c in &r.classes {
                println!(
                    "{:>8}  {:<24} {:>10} {:>14.2} {:>12.4} {:>7.2}%",
                    c.class_id, c.class_name, c.pixels, c.area_m2, c.area_ha, c.percentage
                );
            }
            println!("Total: {} pixels, {:.2} m2, {:.4} ha", r.total_pixels, r.total_area_m2, r.total_area_ha);
        }
        OperationReport::SelectFeatures(r) => {
            println!("Target '{}' ({:?}), scored with {}", r.target, r.task, r.score_function);
            if let Some(notice) = r.notice {
                println!("Note: {notice}");
            }
            if r.rows_dropped > 0 {
                println!("Dropped {} rows with missing values", r.rows_dropped);
            }
            println!("{:>4}  {:<24} {:>14} {:>12}", "Rank", "Feature", "Score", "P-value");
            for s in &r.scores {
                let mark = if s.selected { "*" } else { " " };
                println!("{:>4}{} {:<24} {:>14.4} {:>12.4e}", s.rank, mark, s.name, s.score, s.p_value);
            }
        }
    }
}

fn print_signatures(transition: Option<f64>, json: bool) -> Result<()> {
    if let Some(t) = transition {
        let (sample, condition, summary) = vegetation_transition(t)?;
        if json {
            return print_json(&serde_json::json!({
                "transition": t,
                "sample": sample,
                "condition": condition,
                "indices": summary,
            }));
        }
        println!("Transition {:.2} (healthy vegetation -> bare soil): {}", t, condition);
        for (band, value) in sample.bands() {
            println!("  {:<5} {:.4}", band, value);
        }
        print_summary(&summary);
        return Ok(());
    }

    let mut rows = Vec::with_capacity(Surface::ALL.len());
    for surface in Surface::ALL {
        let sample = surface.signature();
        rows.push((surface, IndexSummary::from_sample(&sample)?, sample));
    }
    if json {
        let value: Vec<_> = rows
            .iter()
            .map(|(surface, summary, sample)| serde_json::json!({ "surface": surface, "sample": sample, "indices": summary }))
            .collect();
        return print_json(&value);
    }
    for (surface, summary, _) in &rows {
        println!("{surface}");
        print_summary(summary);
    }
    Ok(())
}

fn print_summary(summary: &IndexSummary) {
    println!("  NDVI {:.4}  EVI {:.4}  SAVI {:.4}", summary.ndvi, summary.evi, summary.savi);
}
