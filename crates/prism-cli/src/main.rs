//! prism CLI - inspect, build and convert prism models.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use clap::{Parser, Subcommand};
use prism::{Config, MeshExport, Model, ObjId, Point3, TriangleMesh, Vec3};

#[derive(Parser)]
#[command(name = "prism")]
#[command(about = "B-rep object-tree modelling kernel", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display information about a saved model
    Info {
        /// Path to the model file
        file: PathBuf,
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a small demo scene
    Demo {
        /// Output model file
        output: PathBuf,
    },
    /// Copy a top-level object and save the result
    Copy {
        /// Input model file
        input: PathBuf,
        /// Output model file
        output: PathBuf,
        /// Position of the object in the top-level list
        #[arg(short, long, default_value_t = 0)]
        index: usize,
        /// Translation as x,y,z
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, default_value = "0,0,0")]
        offset: Vec<f64>,
    },
    /// Export the whole model as binary STL
    Stl {
        /// Input model file
        input: PathBuf,
        /// Output .stl file
        output: PathBuf,
    },
    /// Export one volume as a JSON triangle mesh
    ExportMesh {
        /// Input model file
        input: PathBuf,
        /// Output .json file
        output: PathBuf,
        /// Position of the volume in the top-level list
        #[arg(short, long, default_value_t = 0)]
        index: usize,
    },
    /// Import a JSON triangle mesh as a new volume
    ImportMesh {
        /// Input .json mesh
        mesh: PathBuf,
        /// Output model file
        output: PathBuf,
        /// Existing model to add the volume to
        #[arg(long)]
        into: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prism=info,prism_io=info,prism_mesh=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => Config::default(),
    };
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Info { file, json } => show_info(&file, config, json)?,
        Commands::Demo { output } => write_demo(&output, config)?,
        Commands::Copy {
            input,
            output,
            index,
            offset,
        } => copy_object(&input, &output, config, index, &offset)?,
        Commands::Stl { input, output } => {
            let mut model = open(&input, config)?;
            let mesh = model.mesh()?;
            ensure!(!mesh.is_empty(), "model has no faces to export");
            fs::write(&output, export_stl_bytes(&mesh))?;
            println!(
                "Exported {} triangles to {}",
                mesh.num_triangles(),
                output.display()
            );
        }
        Commands::ExportMesh {
            input,
            output,
            index,
        } => {
            let mut model = open(&input, config)?;
            let ObjId::Volume(volume) = top_level(&model, index)? else {
                bail!("top-level object {index} is not a volume");
            };
            let mesh = model.export_mesh(volume)?;
            fs::write(&output, serde_json::to_string_pretty(&mesh)?)?;
            println!(
                "Exported {} vertices, {} triangles to {}",
                mesh.vertices.len(),
                mesh.num_triangles(),
                output.display()
            );
        }
        Commands::ImportMesh { mesh, output, into } => {
            let text = fs::read_to_string(&mesh)
                .with_context(|| format!("reading {}", mesh.display()))?;
            let mesh: MeshExport = serde_json::from_str(&text)?;
            let mut model = match into {
                Some(path) => open(&path, config)?,
                None => Model::new(config),
            };
            let volume = model.import_mesh(&mesh)?;
            let faces = model.tree().volume(volume)?.faces.len();
            model.save(&output)?;
            println!("Imported volume with {faces} faces into {}", output.display());
        }
    }

    Ok(())
}

fn open(path: &Path, config: Config) -> Result<Model> {
    Model::open(path, config).with_context(|| format!("loading {}", path.display()))
}

fn top_level(model: &Model, index: usize) -> Result<ObjId> {
    let top = model.tree().top();
    top.get(index).copied().with_context(|| {
        format!(
            "top-level index {index} out of range ({} objects)",
            top.len()
        )
    })
}

fn show_info(path: &Path, config: Config, json: bool) -> Result<()> {
    let model = open(path, config)?;
    let stats = model.stats();
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("File: {}", path.display());
    println!(
        "Objects: {} points, {} edges, {} faces, {} volumes",
        stats.points, stats.edges, stats.faces, stats.volumes
    );
    println!("Top level ({}):", stats.top_level);
    for (i, &obj) in model.tree().top().iter().enumerate() {
        let lock = model.tree().lock_of(obj);
        let ident = model.tree().ident(obj);
        match obj {
            ObjId::Volume(v) => {
                let faces = model.tree().volume(v)?.faces.len();
                println!("  [{i}] volume #{ident} ({faces} faces, lock {lock:?})");
            }
            ObjId::Face(f) => {
                let kind = model.tree().face(f)?.kind;
                println!("  [{i}] {kind:?} face #{ident} (lock {lock:?})");
            }
            other => println!("  [{i}] {} #{ident} (lock {lock:?})", other.kind()),
        }
    }
    Ok(())
}

fn write_demo(output: &Path, config: Config) -> Result<()> {
    let mut model = Model::new(config);

    let base = model
        .tree_mut()
        .make_rect(Point3::origin(), Vec3::x(), Vec3::y())?;
    model.extrude(base, 1.0)?;

    let disc = model
        .tree_mut()
        .make_circle(Point3::new(3.0, 0.5, 0.0), 0.5, Vec3::z())?;
    model.extrude(disc, 2.0)?;

    let outline = [
        Point3::new(5.0, 0.0, 0.0),
        Point3::new(7.0, 0.0, 0.0),
        Point3::new(7.0, 1.0, 0.0),
        Point3::new(6.0, 1.0, 0.0),
        Point3::new(6.0, 2.0, 0.0),
        Point3::new(5.0, 2.0, 0.0),
    ];
    let bracket = model.tree_mut().make_polygon(&outline)?;
    model.extrude(bracket, 0.5)?;

    model.save(output)?;
    let stats = model.stats();
    println!(
        "Wrote {} volumes ({} faces) to {}",
        stats.volumes,
        stats.faces,
        output.display()
    );
    Ok(())
}

fn copy_object(
    input: &Path,
    output: &Path,
    config: Config,
    index: usize,
    offset: &[f64],
) -> Result<()> {
    let [x, y, z] = offset else {
        bail!("offset needs three components, got {}", offset.len());
    };
    let mut model = open(input, config)?;
    let obj = top_level(&model, index)?;
    model.copy(obj, Vec3::new(*x, *y, *z))?;
    model.save(output)?;
    println!(
        "Copied {} {index}; {} top-level objects written to {}",
        obj.kind(),
        model.tree().top().len(),
        output.display()
    );
    Ok(())
}

fn export_stl_bytes(mesh: &TriangleMesh) -> Vec<u8> {
    let num_triangles = mesh.num_triangles();
    let mut data = Vec::with_capacity(84 + num_triangles * 50);

    // 80-byte header
    let mut header = [b' '; 80];
    let tag = b"prism STL export";
    header[..tag.len()].copy_from_slice(tag);
    data.extend_from_slice(&header);
    data.extend_from_slice(&(num_triangles as u32).to_le_bytes());

    for tri in mesh.indices.chunks_exact(3) {
        let [v0, v1, v2] = [tri[0], tri[1], tri[2]].map(|i| mesh.vertex(i));

        let e1 = [v1[0] - v0[0], v1[1] - v0[1], v1[2] - v0[2]];
        let e2 = [v2[0] - v0[0], v2[1] - v0[1], v2[2] - v0[2]];
        let n = [
            e1[1] * e2[2] - e1[2] * e2[1],
            e1[2] * e2[0] - e1[0] * e2[2],
            e1[0] * e2[1] - e1[1] * e2[0],
        ];
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        let n = if len > 1e-10 {
            n.map(|c| c / len)
        } else {
            [0.0, 0.0, 1.0]
        };

        for c in n {
            data.extend_from_slice(&c.to_le_bytes());
        }
        for v in [v0, v1, v2] {
            for c in v {
                data.extend_from_slice(&c.to_le_bytes());
            }
        }
        // Attribute byte count
        data.extend_from_slice(&0u16.to_le_bytes());
    }

    data
}
