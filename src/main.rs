use litflate::compress::compress;
use std::fs;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt)]
struct PackParams {
    /// Source file to pack.
    input: PathBuf,
    /// Where to write the wrapped result; defaults next to the input.
    output: Option<PathBuf>,
    /// Print a JSON report of the winning candidate.
    #[structopt(short)]
    stats: bool,
}

fn main() {
    let params = PackParams::from_args();

    let src = fs::read(&params.input).unwrap();
    let (code, report) = compress(&src).unwrap();

    let output = params
        .output
        .unwrap_or_else(|| params.input.with_extension("packed.py"));
    fs::write(&output, &code).unwrap();

    println!(
        "{} -> {}: {} bytes from {}",
        params.input.display(),
        output.display(),
        report.output_len,
        report.source_len,
    );
    if params.stats {
        println!("{}", serde_json::to_string_pretty(&report).unwrap());
    }
}
