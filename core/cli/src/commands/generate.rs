use anyhow::Result;
use dagforge_car::{write_car_file, MemoryBlockstore};
use dagforge_generator::EntropyReader;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use tracing::info;

use crate::args::GenerateArgs;

pub fn exec(args: GenerateArgs) -> Result<()> {
    let entity = match dagforge_generator::parse(&args.descriptor) {
        Ok(entity) => entity,
        Err(e) => {
            if let Some(pos) = e.position() {
                // point at the offending position on the line below
                eprintln!("{}", args.descriptor);
                eprintln!("{}^", " ".repeat(pos));
            }
            return Err(e.into());
        }
    };
    println!("{}", entity.describe(""));

    let store = MemoryBlockstore::new();
    let mut reader = EntropyReader::new(ChaCha8Rng::seed_from_u64(args.seed as u64));
    let root = entity.generate(&store, &mut reader)?;
    info!(root = %root.root, blocks = store.len(), "generated dag");

    let out = format!("{}.car", root.root);
    write_car_file(&store, root.root, std::path::Path::new(&out))?;
    println!("Wrote to {out}");
    Ok(())
}
