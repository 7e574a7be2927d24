use std::io::Write;

use anyhow::{bail, Context, Result};
use dagforge_car::open_car_file;
use dagforge_ipld::block::{printable_query, writing_visitor, Block};
use dagforge_ipld::path::Path;
use dagforge_ipld::query::{parse_query, ByteRange, DagScope};
use ipld_core::cid::Cid;
use tracing::warn;

use crate::args::ExplainArgs;

pub fn exec(args: ExplainArgs) -> Result<()> {
    let car_path = args
        .car
        .or(args.car_positional)
        .context("no CAR file specified")?;
    let (store, car_root) = open_car_file(&car_path)
        .with_context(|| format!("failed to open {}", car_path.display()))?;
    let mut root = car_root;

    let mut path = Path::default();
    let mut scope = DagScope::All;
    let mut duplicates = true;
    let mut byte_range = None;

    if let Some(query) = &args.query {
        let query = parse_query(query)?;
        root = Some(query.root);
        path = query.path;
        scope = query.scope;
        duplicates = query.duplicates;
        byte_range = query.byte_range;
    }
    if let Some(p) = &args.path {
        path = Path::parse(p);
    }
    if let Some(requested) = &args.root {
        root = Some(Cid::try_from(requested.as_str())?);
    }
    if let Some(scope_arg) = &args.scope {
        scope = scope_arg.parse()?;
    }
    if let Some(bytes) = &args.bytes {
        byte_range = Some(ByteRange::parse(bytes)?);
    }
    if let Some(dups) = args.duplicates {
        duplicates = dups;
    }

    let Some(root) = root else {
        bail!("no root CID specified and CAR file has no root CID");
    };
    if car_root != Some(root) {
        let car_root = car_root.map(|r| r.to_string()).unwrap_or_else(|| "none".to_string());
        warn!(
            requested = %root,
            car = %car_root,
            "requested root CID does not match CAR file root, proceeding with request"
        );
    }
    let block = Block::new(&store, root)?;

    println!(
        "{}",
        printable_query(&root, &path, scope, byte_range, duplicates)
    );

    let byte_range = match byte_range {
        Some(byte_range) => {
            if scope != DagScope::Entity {
                warn!("byte range specified, but scope is not entity, switching to entity scope");
                scope = DagScope::Entity;
            }
            byte_range
        }
        None => ByteRange::default(),
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut visit = writing_visitor(&mut out, duplicates, args.full_path);
    block.navigate(&store, &path, scope, byte_range, args.ignore_missing, &mut visit)?;
    drop(visit);
    out.flush()?;
    Ok(())
}
