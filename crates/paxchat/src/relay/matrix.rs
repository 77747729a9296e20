/// The relay-local `N×N` connectivity matrix.
///
/// `matrix[i][j] == true` means frames sent from `i` are delivered to `j`.
/// The two directions are stored independently even though `failLink`/
/// `fixLink` always flip both at once, matching the contract that the
/// relay checks each direction separately at forwarding time.
#[derive(Debug, Clone)]
pub struct ConnectivityMatrix {
    size: usize,
    links: Vec<bool>,
}

impl ConnectivityMatrix {
    pub fn new(size: usize) -> Self {
        ConnectivityMatrix {
            size,
            links: vec![false; size * size],
        }
    }

    fn index(&self, src: usize, dest: usize) -> usize {
        src * self.size + dest
    }

    pub fn is_connected(&self, src: usize, dest: usize) -> bool {
        if src >= self.size || dest >= self.size {
            return false;
        }
        self.links[self.index(src, dest)]
    }

    pub fn set(&mut self, src: usize, dest: usize, connected: bool) {
        if src >= self.size || dest >= self.size {
            return;
        }
        let idx = self.index(src, dest);
        self.links[idx] = connected;
    }

    /// Seeds bidirectional connectivity between a newly connected peer `k`
    /// and every peer already known to the relay.
    pub fn seed_peer(&mut self, k: usize, already_connected: impl Iterator<Item = usize>) {
        for j in already_connected {
            self.set(k, j, true);
            self.set(j, k, true);
        }
    }

    /// `failLink`/`fixLink` flip both directions at once.
    pub fn set_link(&mut self, a: usize, b: usize, connected: bool) {
        self.set(a, b, connected);
        self.set(b, a, connected);
    }
}
