pub mod braille_graph;
