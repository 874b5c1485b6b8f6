//! Polygon records as stored in point ROM and carried in primitive blocks.
//!
//! Layout (after the leading length word):
//! `quad_index, vertex_count, bias, vertex_count × (x, y, z), quad_count,
//! quad_count × (color, v0, v1, v2, v3)`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshVertex {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshQuad {
    pub color: u16,
    pub vertices: [u8; 4],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolygonRecord {
    pub quad_index: u16,
    pub bias: i16,
    pub vertices: Vec<MeshVertex>,
    pub quads: Vec<MeshQuad>,
}

impl PolygonRecord {
    pub fn parse(words: &[u16]) -> Option<PolygonRecord> {
        let (&quad_index, rest) = words.split_first()?;
        let (&vertex_count, rest) = rest.split_first()?;
        let (&bias, rest) = rest.split_first()?;
        let vertex_words = vertex_count as usize * 3;
        if rest.len() < vertex_words + 1 {
            return None;
        }
        let (vertex_words, rest) = rest.split_at(vertex_words);
        let (&quad_count, rest) = rest.split_first()?;
        let quad_words = quad_count as usize * 5;
        if rest.len() < quad_words {
            return None;
        }
        let vertices = vertex_words
            .chunks_exact(3)
            .map(|v| MeshVertex {
                x: v[0] as i16,
                y: v[1] as i16,
                z: v[2] as i16,
            })
            .collect();
        let quads = rest[..quad_words]
            .chunks_exact(5)
            .map(|q| MeshQuad {
                color: q[0],
                vertices: [q[1] as u8, q[2] as u8, q[3] as u8, q[4] as u8],
            })
            .collect();
        Some(PolygonRecord {
            quad_index,
            bias: bias as i16,
            vertices,
            quads,
        })
    }

    /// Inverse of [`PolygonRecord::parse`], without the leading length word.
    pub fn to_words(&self) -> Vec<u16> {
        let mut words = vec![self.quad_index, self.vertices.len() as u16, self.bias as u16];
        for vertex in &self.vertices {
            words.extend([vertex.x as u16, vertex.y as u16, vertex.z as u16]);
        }
        words.push(self.quads.len() as u16);
        for quad in &self.quads {
            words.push(quad.color);
            words.extend(quad.vertices.map(u16::from));
        }
        words
    }

    /// Depth code of a vertex once the record's bias is applied.
    pub fn z_code(&self, vertex: &MeshVertex) -> u16 {
        vertex.z.wrapping_add(self.bias) as u16
    }
}
