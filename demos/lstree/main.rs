//! Mounts one or more directories or archives and prints the merged
//! virtual tree.
//!
//! ```text
//! cargo run --example lstree -- ./assets ./patch=/patch
//! ```

use clap::Parser;
use stratafs::Vfs;

#[derive(Parser)]
#[command(about = "List the virtual tree assembled from the given mounts")]
struct Args {
    /// Mounts, as `dir` or `dir=mountpoint`, searched in order.
    #[arg(required = true)]
    mounts: Vec<String>,

    /// Virtual directory to start listing from.
    #[arg(long, default_value = "/")]
    path: String,

    /// Follow and list symbolic links too.
    #[arg(long)]
    symlinks: bool,
}

async fn list(vfs: &Vfs, dir: &str, depth: usize) -> stratafs::Result<()> {
    for name in vfs.enumerate_files(dir).await? {
        let full = if dir == "/" { format!("/{name}") } else { format!("{dir}/{name}") };
        let marker = if vfs.is_directory(&full).await { "/" } else { "" };
        println!("{:indent$}{name}{marker}", "", indent = depth * 2);
        if marker == "/" {
            Box::pin(list(vfs, &full, depth + 1)).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let argv0 = std::env::args().next();
    let vfs = Vfs::new(argv0.as_deref()).await?;
    vfs.permit_symbolic_links(args.symlinks).await;

    for mount in &args.mounts {
        match mount.split_once('=') {
            Some((dir, point)) => vfs.mount(dir, Some(point), true).await?,
            None => vfs.mount(mount, None, true).await?,
        }
    }

    list(&vfs, &args.path, 0).await?;
    Ok(())
}
