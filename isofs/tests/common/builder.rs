use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;

pub const BLOCK: usize = 2048;

/// Recording date stamped on every record: 2020-01-02 03:04:05 UTC
pub const RECORD_DATE: [u8; 7] = [120, 1, 2, 3, 4, 5, 0];
pub const RECORD_TIME: i64 = 1_577_934_245;

pub const UID: u32 = 1000;
pub const GID: u32 = 1000;
pub const FILE_MODE: u32 = 0o100644;
pub const DIR_MODE: u32 = 0o40755;
pub const LINK_MODE: u32 = 0o120777;

const ZISOFS_MAGIC: [u8; 8] = [0x37, 0xE4, 0x53, 0x96, 0xC9, 0xDB, 0xD6, 0x07];
const CE_LEN: usize = 28;
const LINK_LEN: usize = 12;

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Zisofs { data: Vec<u8>, shift: u8 },
    Symlink(String),
    Dir(Dir),
    /// Placeholder left behind by a relocated directory
    Relocated,
}

#[derive(Debug, Clone, Default)]
struct Dir {
    children: BTreeMap<String, Node>,
    moved_from: Option<String>,
    /// "." carries a CL entry naming this directory again
    self_link: bool,
}

#[derive(Debug, Clone)]
enum Target {
    Dir(String),
    JolietDir(String),
    File(String),
    Empty,
}

#[derive(Debug, Clone)]
struct RecordPlan {
    name: Vec<u8>,
    flags: u8,
    target: Target,
    /// Entries that always stay in the record (SP)
    inline: Vec<u8>,
    /// Entries that move to a continuation area when those are enabled
    deferred: Vec<u8>,
    child_link: Option<String>,
    parent_link: Option<String>,
}

impl RecordPlan {
    fn new(name: Vec<u8>, flags: u8, target: Target) -> Self {
        Self {
            name,
            flags,
            target,
            inline: Vec::new(),
            deferred: Vec::new(),
            child_link: None,
            parent_link: None,
        }
    }

    fn uses_continuation(&self, continuation: bool) -> bool {
        continuation && !self.deferred.is_empty()
    }

    fn system_use_len(&self, continuation: bool) -> usize {
        let deferred = if self.uses_continuation(continuation) { CE_LEN } else { self.deferred.len() };
        let links = LINK_LEN * (self.child_link.is_some() as usize + self.parent_link.is_some() as usize);
        self.inline.len() + deferred + links
    }

    fn len(&self, continuation: bool) -> usize {
        let pad = usize::from(self.name.len() % 2 == 0);
        let len = 33 + self.name.len() + pad + self.system_use_len(continuation);
        let len = len + len % 2;
        assert!(len <= 255, "directory record for {:?} too long", self.name);
        len
    }
}

/// Builds ISO9660 images in memory
///
/// Files and directories are addressed by absolute path; missing parent
/// directories are created on the way.
pub struct IsoBuilder {
    root: Dir,
    rock_ridge: bool,
    joliet: bool,
    continuation: bool,
    volume_id: String,
}

impl IsoBuilder {
    pub fn new() -> Self {
        Self {
            root: Dir::default(),
            rock_ridge: false,
            joliet: false,
            continuation: false,
            volume_id: "TEST_VOLUME".to_string(),
        }
    }

    /// Emit SP/PX/NM/TF/SL/ZF entries in the primary tree
    pub fn rock_ridge(&mut self, enabled: bool) -> &mut Self {
        self.rock_ridge = enabled;
        self
    }

    /// Add a Joliet (level 3) supplementary descriptor and tree
    pub fn joliet(&mut self, enabled: bool) -> &mut Self {
        self.joliet = enabled;
        self
    }

    /// Move each record's Rock Ridge entries into a CE continuation area
    pub fn continuation_areas(&mut self, enabled: bool) -> &mut Self {
        self.continuation = enabled;
        self
    }

    pub fn volume_id(&mut self, id: &str) -> &mut Self {
        self.volume_id = id.to_string();
        self
    }

    pub fn add_file(&mut self, path: &str, content: &[u8]) -> &mut Self {
        self.insert(path, Node::File(content.to_vec()))
    }

    pub fn add_dir(&mut self, path: &str) -> &mut Self {
        self.dir_mut(path);
        self
    }

    pub fn add_symlink(&mut self, path: &str, target: &str) -> &mut Self {
        self.insert(path, Node::Symlink(target.to_string()))
    }

    /// Add a zisofs-compressed file; all-zero blocks are stored sparse
    pub fn add_zisofs_file(&mut self, path: &str, content: &[u8], block_shift: u8) -> &mut Self {
        self.insert(
            path,
            Node::Zisofs {
                data: content.to_vec(),
                shift: block_shift,
            },
        )
    }

    /// Move directory `path` under /rr_moved, leaving a CL placeholder
    pub fn relocate(&mut self, path: &str) -> &mut Self {
        let (parent, name) = split_parent(path);
        let node = self
            .dir_mut(&parent)
            .children
            .insert(name.clone(), Node::Relocated)
            .expect("relocated directory exists");
        let Node::Dir(mut dir) = node else {
            panic!("{path} is not a directory");
        };
        dir.moved_from = Some(parent);
        self.dir_mut("/rr_moved").children.insert(name, Node::Dir(dir));
        self
    }

    /// Give the "." record of directory `path` a CL entry pointing at itself
    pub fn link_to_self(&mut self, path: &str) -> &mut Self {
        self.dir_mut(path).self_link = true;
        self
    }

    fn insert(&mut self, path: &str, node: Node) -> &mut Self {
        let (parent, name) = split_parent(path);
        self.dir_mut(&parent).children.insert(name, node);
        self
    }

    fn dir_mut(&mut self, path: &str) -> &mut Dir {
        let mut dir = &mut self.root;
        for component in components(path) {
            let node = dir
                .children
                .entry(component.to_string())
                .or_insert_with(|| Node::Dir(Dir::default()));
            dir = match node {
                Node::Dir(dir) => dir,
                _ => panic!("{component} is not a directory"),
            };
        }
        dir
    }

    pub fn build(&self) -> Vec<u8> {
        let mut dirs = Vec::new();
        collect_dirs(&self.root, "/".to_string(), &mut dirs);
        let mut files = Vec::new();
        collect_files(&self.root, "/", &mut files);

        let iso_plans: Vec<Vec<RecordPlan>> = dirs
            .iter()
            .map(|(path, dir)| self.records(path, dir, false))
            .collect();
        let joliet_plans: Vec<Vec<RecordPlan>> = if self.joliet {
            dirs.iter().map(|(path, dir)| self.records(path, dir, true)).collect()
        } else {
            Vec::new()
        };

        // 16 = PVD, 17 = SVD when Joliet, then the terminator
        let mut next_lba = 17u32;
        let svd_lba = self.joliet.then(|| {
            next_lba += 1;
            17
        });
        let terminator_lba = next_lba;
        next_lba += 1;

        let mut dir_extents = HashMap::new();
        let mut iso_layouts = Vec::new();
        for ((path, _), specs) in dirs.iter().zip(&iso_plans) {
            let (positions, blocks) = pack(specs, self.continuation);
            dir_extents.insert(path.clone(), (next_lba, (blocks * BLOCK) as u32));
            next_lba += blocks as u32;
            iso_layouts.push(positions);
        }

        let mut joliet_extents = HashMap::new();
        let mut joliet_layouts = Vec::new();
        for ((path, _), specs) in dirs.iter().zip(&joliet_plans) {
            let (positions, blocks) = pack(specs, false);
            joliet_extents.insert(path.clone(), (next_lba, (blocks * BLOCK) as u32));
            next_lba += blocks as u32;
            joliet_layouts.push(positions);
        }

        // continuation areas, packed into their own blocks
        let mut areas: HashMap<(usize, usize), (u32, u32, u32)> = HashMap::new();
        let mut area_block: Option<u32> = None;
        let mut area_offset = 0usize;
        for (d, specs) in iso_plans.iter().enumerate() {
            for (r, spec) in specs.iter().enumerate() {
                if !spec.uses_continuation(self.continuation) {
                    continue;
                }
                let len = spec.deferred.len();
                if area_block.is_none() || area_offset + len > BLOCK {
                    area_block = Some(next_lba);
                    next_lba += 1;
                    area_offset = 0;
                }
                areas.insert((d, r), (area_block.unwrap(), area_offset as u32, len as u32));
                area_offset += len;
            }
        }

        let mut file_extents = HashMap::new();
        for (path, data) in &files {
            file_extents.insert(path.clone(), (next_lba, data.len() as u32));
            next_lba += data.len().div_ceil(BLOCK) as u32;
        }

        let mut image = vec![0u8; next_lba as usize * BLOCK];
        let extent_of = |target: &Target| -> (u32, u32) {
            match target {
                Target::Dir(path) => dir_extents[path],
                Target::JolietDir(path) => joliet_extents[path],
                Target::File(path) => file_extents[path],
                Target::Empty => (0, 0),
            }
        };

        for (d, ((path, _), specs)) in dirs.iter().zip(&iso_plans).enumerate() {
            let (extent, _) = dir_extents[path];
            for (r, spec) in specs.iter().enumerate() {
                let mut system_use = spec.inline.clone();
                match areas.get(&(d, r)) {
                    Some(&(block, offset, len)) => {
                        system_use.extend(ce(block, offset, len));
                        let start = block as usize * BLOCK + offset as usize;
                        image[start..start + spec.deferred.len()].copy_from_slice(&spec.deferred);
                    }
                    None => system_use.extend_from_slice(&spec.deferred),
                }
                if let Some(target) = &spec.child_link {
                    system_use.extend(link(b"CL", dir_extents[target].0));
                }
                if let Some(target) = &spec.parent_link {
                    system_use.extend(link(b"PL", dir_extents[target].0));
                }
                let (target_extent, target_size) = extent_of(&spec.target);
                let record = encode_record(&spec.name, spec.flags, target_extent, target_size, &system_use);
                let (block, offset) = iso_layouts[d][r];
                let start = (extent as usize + block) * BLOCK + offset;
                image[start..start + record.len()].copy_from_slice(&record);
            }
        }

        for (d, ((path, _), specs)) in dirs.iter().zip(&joliet_plans).enumerate() {
            let (extent, _) = joliet_extents[path];
            for (r, spec) in specs.iter().enumerate() {
                let (target_extent, target_size) = extent_of(&spec.target);
                let record = encode_record(&spec.name, spec.flags, target_extent, target_size, &[]);
                let (block, offset) = joliet_layouts[d][r];
                let start = (extent as usize + block) * BLOCK + offset;
                image[start..start + record.len()].copy_from_slice(&record);
            }
        }

        for (path, data) in &files {
            let start = file_extents[path].0 as usize * BLOCK;
            image[start..start + data.len()].copy_from_slice(data);
        }

        let (root_extent, root_size) = dir_extents["/"];
        self.write_descriptor(&mut image, 16, 1, root_extent, root_size, next_lba);
        if let Some(lba) = svd_lba {
            let (root_extent, root_size) = joliet_extents["/"];
            self.write_descriptor(&mut image, lba, 2, root_extent, root_size, next_lba);
        }
        let start = terminator_lba as usize * BLOCK;
        image[start] = 255;
        image[start + 1..start + 6].copy_from_slice(b"CD001");
        image[start + 6] = 1;

        image
    }

    fn records(&self, path: &str, dir: &Dir, joliet: bool) -> Vec<RecordPlan> {
        let rr = self.rock_ridge && !joliet;
        let dir_target = |p: &str| {
            if joliet {
                Target::JolietDir(p.to_string())
            } else {
                Target::Dir(p.to_string())
            }
        };
        let mut out = Vec::new();

        let mut dot = RecordPlan::new(vec![0], 0x02, dir_target(path));
        if rr {
            if path == "/" {
                dot.inline = vec![b'S', b'P', 7, 1, 0xBE, 0xEF, 0];
            }
            dot.deferred = [px(DIR_MODE, 2), tf()].concat();
            if dir.self_link {
                dot.child_link = Some(path.to_string());
            }
        }
        out.push(dot);

        let mut dotdot = RecordPlan::new(vec![1], 0x02, dir_target(split_parent(path).0.as_str()));
        if rr {
            dotdot.deferred = [px(DIR_MODE, 2), tf()].concat();
            dotdot.parent_link = dir.moved_from.clone();
        }
        out.push(dotdot);

        for (name, node) in &dir.children {
            let child = join(path, name);
            let is_file = matches!(node, Node::File(_) | Node::Zisofs { .. });
            let identifier = if joliet {
                let versioned = if is_file { format!("{name};1") } else { name.clone() };
                versioned.encode_utf16().flat_map(|unit| unit.to_be_bytes()).collect()
            } else {
                let upper = name.to_ascii_uppercase();
                let versioned = if is_file { format!("{upper};1") } else { upper };
                versioned.into_bytes()
            };
            let mut spec = match node {
                Node::File(_) | Node::Zisofs { .. } => RecordPlan::new(identifier, 0, Target::File(child)),
                Node::Dir(_) => RecordPlan::new(identifier, 0x02, dir_target(child.as_str())),
                Node::Symlink(_) | Node::Relocated => RecordPlan::new(identifier, 0, Target::Empty),
            };
            if rr {
                let mut entries = match node {
                    Node::File(_) => px(FILE_MODE, 1),
                    Node::Zisofs { data, shift } => [px(FILE_MODE, 1), zf(data.len() as u32, *shift)].concat(),
                    Node::Symlink(target) => [px(LINK_MODE, 1), sl(target)].concat(),
                    Node::Dir(d) if d.moved_from.is_some() => [px(DIR_MODE, 2), vec![b'R', b'E', 4, 1]].concat(),
                    Node::Dir(_) => px(DIR_MODE, 2),
                    Node::Relocated => {
                        spec.child_link = Some(join("/rr_moved", name));
                        px(DIR_MODE, 2)
                    }
                };
                entries.extend(nm(name));
                entries.extend(tf());
                spec.deferred = entries;
            }
            out.push(spec);
        }
        out
    }

    fn write_descriptor(&self, image: &mut [u8], lba: u32, kind: u8, root_extent: u32, root_size: u32, space: u32) {
        let start = lba as usize * BLOCK;
        let vd = &mut image[start..start + BLOCK];
        vd[0] = kind;
        vd[1..6].copy_from_slice(b"CD001");
        vd[6] = 1;

        let joliet = kind == 2;
        let text = |value: &str, len: usize| -> Vec<u8> {
            let mut field: Vec<u8> = if joliet {
                value.encode_utf16().flat_map(|unit| unit.to_be_bytes()).collect()
            } else {
                value.as_bytes().to_vec()
            };
            while field.len() < len {
                if joliet {
                    field.extend_from_slice(&[0, b' ']);
                } else {
                    field.push(b' ');
                }
            }
            field.truncate(len);
            field
        };
        vd[8..40].copy_from_slice(&text("LINUX", 32));
        vd[40..72].copy_from_slice(&text(self.volume_id.as_str(), 32));
        vd[80..88].copy_from_slice(&both32(space));
        if joliet {
            vd[88..91].copy_from_slice(&[0x25, 0x2F, 0x45]);
        }
        vd[120..124].copy_from_slice(&both16(1));
        vd[124..128].copy_from_slice(&both16(1));
        vd[128..132].copy_from_slice(&both16(BLOCK as u16));
        let root = encode_record(&[0], 0x02, root_extent, root_size, &[]);
        vd[156..190].copy_from_slice(&root);
        vd[190..318].copy_from_slice(&text("", 128));
        vd[318..446].copy_from_slice(&text("PUBLISHER", 128));
        vd[446..574].copy_from_slice(&text("", 128));
        vd[574..702].copy_from_slice(&text("ISOFS TEST BUILDER", 128));
        vd[813..830].copy_from_slice(b"2020010203040500\0");
        vd[830..847].copy_from_slice(b"0000000000000000\0");
        vd[881] = 1;
    }
}

impl Default for IsoBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

fn split_parent(path: &str) -> (String, String) {
    let parts: Vec<&str> = components(path).collect();
    match parts.split_last() {
        Some((name, parent)) if !parent.is_empty() => (format!("/{}", parent.join("/")), name.to_string()),
        Some((name, _)) => ("/".to_string(), name.to_string()),
        None => ("/".to_string(), String::new()),
    }
}

fn collect_dirs<'a>(dir: &'a Dir, path: String, out: &mut Vec<(String, &'a Dir)>) {
    out.push((path.clone(), dir));
    for (name, node) in &dir.children {
        if let Node::Dir(child) = node {
            collect_dirs(child, join(&path, name), out);
        }
    }
}

fn collect_files(dir: &Dir, path: &str, out: &mut Vec<(String, Vec<u8>)>) {
    for (name, node) in &dir.children {
        let child = join(path, name);
        match node {
            Node::File(data) => out.push((child, data.clone())),
            Node::Zisofs { data, shift } => out.push((child, zisofs_compress(data, *shift))),
            Node::Dir(sub) => collect_files(sub, &child, out),
            Node::Symlink(_) | Node::Relocated => {}
        }
    }
}

/// Position of every record as (block index, byte offset), and the block count
fn pack(specs: &[RecordPlan], continuation: bool) -> (Vec<(usize, usize)>, usize) {
    let mut positions = Vec::new();
    let mut block = 0;
    let mut offset = 0;
    for spec in specs {
        let len = spec.len(continuation);
        if offset + len > BLOCK {
            block += 1;
            offset = 0;
        }
        positions.push((block, offset));
        offset += len;
    }
    (positions, block + 1)
}

fn encode_record(name: &[u8], flags: u8, extent: u32, size: u32, system_use: &[u8]) -> Vec<u8> {
    let pad = usize::from(name.len() % 2 == 0);
    let mut len = 33 + name.len() + pad + system_use.len();
    len += len % 2;
    let mut record = vec![0u8; len];
    record[0] = len as u8;
    record[2..10].copy_from_slice(&both32(extent));
    record[10..18].copy_from_slice(&both32(size));
    record[18..25].copy_from_slice(&RECORD_DATE);
    record[25] = flags;
    record[28..32].copy_from_slice(&both16(1));
    record[32] = name.len() as u8;
    record[33..33 + name.len()].copy_from_slice(name);
    let sa_start = 33 + name.len() + pad;
    record[sa_start..sa_start + system_use.len()].copy_from_slice(system_use);
    record
}

pub fn both32(value: u32) -> [u8; 8] {
    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&value.to_le_bytes());
    out[4..].copy_from_slice(&value.to_be_bytes());
    out
}

pub fn both16(value: u16) -> [u8; 4] {
    let mut out = [0u8; 4];
    out[..2].copy_from_slice(&value.to_le_bytes());
    out[2..].copy_from_slice(&value.to_be_bytes());
    out
}

fn entry(signature: &[u8; 2], payload: &[u8]) -> Vec<u8> {
    let mut out = vec![signature[0], signature[1], (payload.len() + 4) as u8, 1];
    out.extend_from_slice(payload);
    out
}

fn px(mode: u32, nlink: u32) -> Vec<u8> {
    let payload = [both32(mode), both32(nlink), both32(UID), both32(GID)].concat();
    entry(b"PX", &payload)
}

fn nm(name: &str) -> Vec<u8> {
    let mut payload = vec![0];
    payload.extend_from_slice(name.as_bytes());
    entry(b"NM", &payload)
}

fn tf() -> Vec<u8> {
    // modify, access, attributes in short form
    let mut payload = vec![0x0E];
    for _ in 0..3 {
        payload.extend_from_slice(&RECORD_DATE);
    }
    entry(b"TF", &payload)
}

fn sl(target: &str) -> Vec<u8> {
    let mut payload = vec![0];
    if target.starts_with('/') {
        payload.extend_from_slice(&[0x08, 0]);
    }
    for component in components(target) {
        match component {
            "." => payload.extend_from_slice(&[0x02, 0]),
            ".." => payload.extend_from_slice(&[0x04, 0]),
            text => {
                payload.extend_from_slice(&[0, text.len() as u8]);
                payload.extend_from_slice(text.as_bytes());
            }
        }
    }
    entry(b"SL", &payload)
}

fn zf(real_size: u32, shift: u8) -> Vec<u8> {
    let mut payload = b"pz".to_vec();
    payload.extend_from_slice(&[4, shift]);
    payload.extend_from_slice(&both32(real_size));
    entry(b"ZF", &payload)
}

fn ce(block: u32, offset: u32, len: u32) -> Vec<u8> {
    let payload = [both32(block), both32(offset), both32(len)].concat();
    entry(b"CE", &payload)
}

fn link(signature: &[u8; 2], block: u32) -> Vec<u8> {
    entry(signature, &both32(block))
}

/// zisofs file layout: 16-byte header, block table, zlib blocks
pub fn zisofs_compress(data: &[u8], shift: u8) -> Vec<u8> {
    let block_size = 1usize << shift;
    let nblocks = data.len().div_ceil(block_size);

    let mut out = ZISOFS_MAGIC.to_vec();
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&[4, shift, 0, 0]);
    let table_start = out.len();
    out.resize(table_start + (nblocks + 1) * 4, 0);

    let mut pointers = vec![out.len() as u32];
    for chunk in data.chunks(block_size) {
        if chunk.iter().any(|&b| b != 0) {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
            encoder.write_all(chunk).unwrap();
            out.extend(encoder.finish().unwrap());
        }
        pointers.push(out.len() as u32);
    }
    for (i, pointer) in pointers.iter().enumerate() {
        let at = table_start + i * 4;
        out[at..at + 4].copy_from_slice(&pointer.to_le_bytes());
    }
    out
}
