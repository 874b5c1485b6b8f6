use argh::FromArgs;
use sys21::{
    geometry::{
        board::{Board, Topology},
        flat::FlatPipeline,
        pipeline::Pipeline,
        point_rom::PointRom,
        reference_slave::ReferenceSlave,
        shared_ram::{page_windows, Page},
        GeometryPipeline, Quad, QuadLog,
    },
    machine::{Machine, MachineConfig},
};
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
#[argh(description = "System 21 polygon pipeline")]
struct Arguments {
    #[argh(
        option,
        short = 'p',
        description = "point ROM image, three big-endian bytes per word"
    )]
    point_rom: String,
    #[argh(
        option,
        short = 's',
        description = "scene image of little-endian 16-bit words, loaded at display list page 0"
    )]
    scene: Option<String>,
    #[argh(
        option,
        short = 'b',
        default = "Board::Starblade",
        description = "starblade, solvalou, aircombat, cybersled or winrun"
    )]
    board: Board,
    #[argh(
        option,
        from_str_fn(parse_hex),
        description = "transfer start address in hex (default: page 0 object list, indirect)"
    )]
    start: Option<u16>,
    #[argh(option, short = 'f', default = "1", description = "frames to run")]
    frames: u64,
    #[argh(
        option,
        short = 'd',
        description = "decode an object's mesh from point ROM and exit"
    )]
    dump_object: Option<u16>,
}

fn parse_hex(value: &str) -> Result<u16, String> {
    let digits = value.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|error| format!("{value}: {error}"))
}

fn words_le(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|word| u16::from_le_bytes([word[0], word[1]]))
        .collect()
}

fn dump_object(rom: &PointRom, object: u16) {
    println!(
        "object {:#x}: mesh list at {:#x}",
        object,
        rom.object_address(object)
    );
    for (address, record) in rom.mesh(object) {
        let Some(record) = record else {
            println!(
                "  {:6x}: malformed ({} words)",
                address,
                rom.record_len(address)
            );
            continue;
        };
        println!(
            "  {:6x}: quad index {:#x}, bias {}, {} vertices, {} quads",
            address,
            record.quad_index,
            record.bias,
            record.vertices.len(),
            record.quads.len()
        );
        for (i, vertex) in record.vertices.iter().enumerate() {
            println!(
                "    v{:<3} {:6} {:6} {:6}  # z code {:#06x}",
                i,
                vertex.x,
                vertex.y,
                vertex.z,
                record.z_code(vertex)
            );
        }
        for quad in &record.quads {
            println!("    quad {:#06x} {:?}", quad.color, quad.vertices);
        }
    }
}

fn describe(quad: &Quad) -> String {
    let vertices: Vec<String> = quad
        .vertices
        .iter()
        .map(|v| format!("({}, {}, {:#06x})", v.x, v.y, v.z))
        .collect();
    format!(
        "{:#06x}{} {}",
        quad.color,
        if quad.direct_draw { " direct" } else { "" },
        vertices.join(" ")
    )
}

fn run_frames<P: GeometryPipeline>(
    machine: &mut Machine<P>,
    frames: u64,
    mut host: impl FnMut(&mut P, &mut QuadLog),
) {
    for _ in 0..frames {
        let mut log = QuadLog::default();
        host(machine.pipeline_mut(), &mut log);
        let report = machine.run_frame(&mut log);
        println!(
            "frame {}: {} quads, {} clears, {} faults",
            report.frame,
            log.quads.len(),
            log.clears,
            report.faults.len()
        );
        for fault in &report.faults {
            println!("  {fault}");
        }
        for quad in &log.quads {
            println!("  {}", describe(quad));
        }
    }
}

fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args: Arguments = argh::from_env();
    let point_rom = PointRom::from_packed_be(&std::fs::read(&args.point_rom)?);
    if let Some(object) = args.dump_object {
        dump_object(&point_rom, object);
        return Ok(());
    }
    let scene = match &args.scene {
        Some(path) => words_le(&std::fs::read(path)?),
        None => Vec::new(),
    };
    let config = MachineConfig {
        board: args.board,
        ..MachineConfig::default()
    };
    let windows = page_windows();
    let page = &windows[Page::Page0];

    match args.board.profile().topology {
        Topology::MasterSlave => {
            let mut pipeline =
                Pipeline::new(args.board, point_rom, Box::new(ReferenceSlave::new()))
                    .map_err(std::io::Error::other)?;
            pipeline.shared_ram_mut().load(page.camera.start, &scene);
            let start = args.start.unwrap_or(0x8000 | page.objects.start);
            let mut machine = Machine::new(config, pipeline);
            run_frames(&mut machine, args.frames, |pipeline, _| {
                pipeline.start_transfer(start)
            });
        }
        Topology::Flat => {
            let pipeline =
                FlatPipeline::new(args.board, point_rom).map_err(std::io::Error::other)?;
            let mut machine = Machine::new(config, pipeline);
            run_frames(&mut machine, args.frames, |pipeline, log| {
                for &word in &scene {
                    pipeline.render_write(word);
                }
                pipeline.render_complete(1, log);
            });
        }
    }
    Ok(())
}
