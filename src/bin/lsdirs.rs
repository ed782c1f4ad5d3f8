use std::path::PathBuf;

use guided_integration::DirectorySelectionPlan;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "lsdirs", about = "List the sample folders a keyword selects")]
struct Opt {
    /// Directory containing the sample folders
    #[structopt(parse(from_os_str))]
    source: PathBuf,
    /// Keyword present in the folder names; ALL lists every folder
    #[structopt(default_value = "ALL")]
    keyword: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::from_args();
    let names = DirectorySelectionPlan::Keyword(opt.keyword).resolve(&opt.source)?;
    println!("{}", names.join("\n"));
    Ok(())
}
