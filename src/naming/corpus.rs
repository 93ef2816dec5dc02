//! Встроенный корпус для модели Маркова

pub const BUILTIN_CORPUS: &[&str] = &[
    "aldermere", "ambergate", "arden", "ashford", "aveloc", "balnair", "barrowmere",
    "belcarra", "beringholt", "blackmoor", "brackwater", "brenmor", "caldera", "carnwick",
    "castamere", "celadon", "corrin", "craigmoor", "dalmore", "darnholt", "delvaric",
    "dunmarrow", "durnwald", "eastmarch", "edrahil", "elmsworth", "emberlin", "eskarra",
    "falcrest", "farrowdale", "fenwick", "galdren", "garrowick", "glenmaris", "gorvane",
    "greywater", "halvarn", "harrowgate", "heathmere", "highcairn", "holloway", "ironwold",
    "isenmoor", "jorvane", "kaldrim", "karthen", "kelmoor", "kingsreach", "lanthorn",
    "larkspire", "lindale", "lorwick", "maldren", "marrowind", "merovar", "mistral",
    "morwen", "nairn", "nethercoombe", "northwold", "oakhaven", "orlendal", "ostmark",
    "pellandor", "penmarrow", "quarrendon", "ravenholm", "redmarch", "rillamere",
    "rookhallow", "saltmarsh", "selvarin", "silverbrook", "skarnholt", "stonemere",
    "suthergate", "talmoor", "tarnwick", "thornvale", "tirwen", "torvald", "ulvermoor",
    "valdren", "varrowind", "velmora", "westerfold", "whitecairn", "windmere", "wolderan",
    "yarrowdale", "yselmoor", "zandrel", "amaranth", "brightwater", "coldharbour",
    "dawnrest", "elderglen", "frostholm", "goldmere", "hawksmoor", "ivywood", "juniperfell",
];
